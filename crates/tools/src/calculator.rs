//! Calculator tool: pure numeric evaluation.
//!
//! Two modes:
//! - `expression`: `+`, `-`, `*`, `/`, parentheses and unary negation,
//!   evaluated with a small recursive-descent parser
//! - `operation` over `numbers`: average, sum, min or max

use async_trait::async_trait;
use goalward_core::error::ToolError;
use goalward_core::tool::{Tool, ToolKind, ToolResult};
use serde::Deserialize;

/// Deepest nesting of parentheses and unary minus the evaluator accepts.
const MAX_DEPTH: usize = 64;
const MAX_EXPRESSION_LEN: usize = 1024;

pub struct CalculatorTool;

/// Aggregate operations over a list of numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Average,
    Sum,
    Min,
    Max,
}

impl Aggregate {
    /// Apply to a non-empty slice.
    pub fn apply(&self, numbers: &[f64]) -> Result<f64, String> {
        if numbers.is_empty() {
            return Err("No numbers to aggregate".into());
        }
        let value = match self {
            Aggregate::Sum => numbers.iter().sum(),
            Aggregate::Average => numbers.iter().sum::<f64>() / numbers.len() as f64,
            Aggregate::Min => numbers.iter().copied().fold(f64::INFINITY, f64::min),
            Aggregate::Max => numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        };
        Ok(value)
    }
}

#[derive(Debug, Deserialize)]
struct CalculatorArgs {
    expression: Option<String>,
    operation: Option<Aggregate>,
    numbers: Option<Vec<f64>>,
}

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &str {
        "calculator"
    }

    fn description(&self) -> &str {
        "Do arithmetic. Either pass an `expression` such as '(2 + 3) * 4', or an \
         `operation` (average, sum, min, max) together with a list of `numbers`."
    }

    fn kind(&self) -> ToolKind {
        ToolKind::Analysis
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "expression": {
                    "type": "string",
                    "minLength": 1,
                    "maxLength": MAX_EXPRESSION_LEN,
                    "description": "Arithmetic expression, e.g. '(2 + 3) * 4'"
                },
                "operation": {
                    "type": "string",
                    "enum": ["average", "sum", "min", "max"],
                    "description": "Aggregate to compute over `numbers`"
                },
                "numbers": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 1
                }
            },
            "oneOf": [
                { "required": ["expression"] },
                { "required": ["operation", "numbers"] }
            ]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: CalculatorArgs = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

        let value = match (args.expression, args.operation, args.numbers) {
            (Some(expr), _, _) => evaluate(&expr),
            (None, Some(op), Some(numbers)) => op.apply(&numbers),
            _ => {
                return Err(ToolError::InvalidArguments(
                    "Expected 'expression', or 'operation' with 'numbers'".into(),
                ));
            }
        }
        .map_err(|cause| ToolError::Execution {
            tool: "calculator".into(),
            cause,
        })?;

        Ok(ToolResult::text(format_number(value)).with_data(serde_json::json!({ "result": value })))
    }
}

/// Integers print without a trailing `.0`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

// ── Recursive-descent expression evaluator ────────────────────────────────

/// Evaluate an arithmetic expression.
pub fn evaluate(expr: &str) -> Result<f64, String> {
    let tokens = tokenize(expr)?;
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        depth: 0,
    };
    let value = parser.expr()?;
    match parser.tokens.get(parser.pos) {
        None => Ok(value),
        Some(tok) => Err(format!("Unexpected {tok:?} at token {}", parser.pos)),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Number(f64),
    Op(char),
    Open,
    Close,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            c if c.is_whitespace() => {}
            '+' | '-' | '*' | '/' => tokens.push(Token::Op(c)),
            '(' => tokens.push(Token::Open),
            ')' => tokens.push(Token::Close),
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = start + c.len_utf8();
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &input[start..end];
                let n = literal
                    .parse()
                    .map_err(|_| format!("Invalid number: {literal}"))?;
                tokens.push(Token::Number(n));
            }
            c => return Err(format!("Unexpected character: '{c}'")),
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.peek();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T, String>) -> Result<T, String> {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nesting too deep".into());
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    // expr = term (('+' | '-') term)*
    fn expr(&mut self) -> Result<f64, String> {
        let mut left = self.term()?;
        while let Some(Token::Op(op @ ('+' | '-'))) = self.peek() {
            self.pos += 1;
            let right = self.term()?;
            left = if op == '+' { left + right } else { left - right };
        }
        Ok(left)
    }

    // term = unary (('*' | '/') unary)*
    fn term(&mut self) -> Result<f64, String> {
        let mut left = self.unary()?;
        while let Some(Token::Op(op @ ('*' | '/'))) = self.peek() {
            self.pos += 1;
            let right = self.unary()?;
            if op == '*' {
                left *= right;
            } else if right == 0.0 {
                return Err("Division by zero".into());
            } else {
                left /= right;
            }
        }
        Ok(left)
    }

    // unary = '-' unary | primary
    fn unary(&mut self) -> Result<f64, String> {
        if let Some(Token::Op('-')) = self.peek() {
            self.pos += 1;
            return Ok(-self.nested(Self::unary)?);
        }
        self.primary()
    }

    // primary = NUMBER | '(' expr ')'
    fn primary(&mut self) -> Result<f64, String> {
        match self.next() {
            Some(Token::Number(n)) => Ok(n),
            Some(Token::Open) => {
                let value = self.nested(Self::expr)?;
                match self.next() {
                    Some(Token::Close) => Ok(value),
                    _ => Err("Expected closing parenthesis".into()),
                }
            }
            Some(tok) => Err(format!("Unexpected {tok:?}")),
            None => Err("Unexpected end of expression".into()),
        }
    }
}
