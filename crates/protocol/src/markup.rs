//! A small tagged-markup (XML subset) reader and writer.
//!
//! Supported: elements, attributes (read and discarded), text, the five
//! predefined entities plus numeric character references, CDATA, comments,
//! processing instructions and a doctype before the root. Namespaces and
//! DTD validation are out of scope.

use goalward_core::error::ParseError;

/// Nesting deeper than this is rejected as malformed.
pub const MAX_DEPTH: usize = 64;

/// A parsed element. Text content of mixed nodes is concatenated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub name: String,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// First direct child called `name`.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    /// First direct child matching any of `names`, in order of preference.
    pub fn child_any(&self, names: &[&str]) -> Option<&Element> {
        names.iter().find_map(|n| self.child(n))
    }

    /// Text content with surrounding whitespace removed.
    pub fn text(&self) -> &str {
        self.text.trim()
    }

    /// Trimmed text of child `name`, if present and non-empty.
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(Element::text).filter(|t| !t.is_empty())
    }
}

/// Parse a document and return its root element.
///
/// Anything before the first `<` and anything after the root closes is
/// ignored, so a sentence of prose around the markup does not fail the parse.
pub fn parse_document(input: &str) -> Result<Element, ParseError> {
    let start = input.find('<').ok_or_else(|| ParseError::Malformed {
        position: 0,
        reason: "no markup found".into(),
    })?;

    let mut reader = Reader {
        src: input,
        pos: start,
    };
    reader.skip_prolog()?;
    if reader.at_end() {
        return Err(reader.error("document has no root element"));
    }
    reader.element(0)
}

/// Remove a surrounding Markdown code fence (```` ``` ```` or ```` ```xml ````).
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string on the opening line
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    match body.rfind("```") {
        Some(end) => body[..end].trim(),
        None => body.trim(),
    }
}

/// Escape text for element content or a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Resolve entity and character references. An `&` that does not start a
/// recognisable reference is kept literally.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];

        let decoded = rest
            .find(';')
            .filter(|&semi| semi <= 12)
            .and_then(|semi| decode_entity(&rest[1..semi]).map(|c| (c, semi)));

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &rest[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

struct Reader<'a> {
    src: &'a str,
    pos: usize,
}

impl Reader<'_> {
    fn rest(&self) -> &str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::Malformed {
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    /// Advance past `terminator`, or fail with `what` if it never appears.
    fn skip_past(&mut self, terminator: &str, what: &str) -> Result<(), ParseError> {
        match self.rest().find(terminator) {
            Some(i) => {
                self.pos += i + terminator.len();
                Ok(())
            }
            None => Err(self.error(format!("unterminated {what}"))),
        }
    }

    fn skip_prolog(&mut self) -> Result<(), ParseError> {
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_past("?>", "processing instruction")?;
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if rest.starts_with("<!") {
                self.skip_past(">", "declaration")?;
            } else {
                return Ok(());
            }
        }
    }

    fn name(&mut self) -> Result<String, ParseError> {
        let len = self
            .rest()
            .find(|c: char| !(c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(self.error("expected a tag name"));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        Ok(name)
    }

    fn expect(&mut self, token: &str) -> Result<(), ParseError> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Ok(())
        } else {
            Err(self.error(format!("expected '{token}'")))
        }
    }

    fn skip_attribute(&mut self) -> Result<(), ParseError> {
        self.name()?;
        self.skip_whitespace();
        self.expect("=")?;
        self.skip_whitespace();
        let quote = match self.rest().chars().next() {
            Some(q @ ('"' | '\'')) => q,
            _ => return Err(self.error("expected a quoted attribute value")),
        };
        self.pos += 1;
        match self.rest().find(quote) {
            Some(i) => {
                self.pos += i + 1;
                Ok(())
            }
            None => Err(self.error("unterminated attribute value")),
        }
    }

    fn element(&mut self, depth: usize) -> Result<Element, ParseError> {
        if depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.expect("<")?;
        let mut element = Element {
            name: self.name()?,
            ..Element::default()
        };

        // Attributes until '>' or '/>'
        loop {
            self.skip_whitespace();
            if self.rest().starts_with("/>") {
                self.pos += 2;
                return Ok(element);
            }
            if self.rest().starts_with('>') {
                self.pos += 1;
                break;
            }
            if self.at_end() {
                return Err(self.error(format!("unterminated start tag <{}>", element.name)));
            }
            self.skip_attribute()?;
        }

        loop {
            let rest = self.rest();
            if rest.is_empty() {
                return Err(self.error(format!("<{}> is never closed", element.name)));
            } else if rest.starts_with("</") {
                self.pos += 2;
                let close = self.name()?;
                if close != element.name {
                    return Err(self.error(format!(
                        "expected </{}>, found </{close}>",
                        element.name
                    )));
                }
                self.skip_whitespace();
                self.expect(">")?;
                return Ok(element);
            } else if rest.starts_with("<!--") {
                self.skip_past("-->", "comment")?;
            } else if let Some(cdata) = rest.strip_prefix("<![CDATA[") {
                let end = cdata
                    .find("]]>")
                    .ok_or_else(|| self.error("unterminated CDATA section"))?;
                element.text.push_str(&cdata[..end]);
                self.pos += "<![CDATA[".len() + end + "]]>".len();
            } else if rest.starts_with('<') {
                let child = self.element(depth + 1)?;
                element.children.push(child);
            } else {
                let len = rest.find('<').unwrap_or(rest.len());
                element.text.push_str(&unescape(&rest[..len]));
                self.pos += len;
            }
        }
    }
}

/// Builds indented markup. Output depends only on the calls made.
#[derive(Debug, Default)]
pub struct MarkupWriter {
    buf: String,
    depth: usize,
}

impl MarkupWriter {
    pub fn new() -> Self {
        Self::default()
    }

    fn indent(&mut self) {
        for _ in 0..self.depth {
            self.buf.push_str("  ");
        }
    }

    fn start_tag(&mut self, name: &str, attributes: &[(&str, String)]) {
        self.indent();
        self.buf.push('<');
        self.buf.push_str(name);
        for (key, value) in attributes {
            self.buf.push(' ');
            self.buf.push_str(key);
            self.buf.push_str("=\"");
            self.buf.push_str(&escape(value));
            self.buf.push('"');
        }
    }

    /// Open a container element.
    pub fn open(&mut self, name: &str, attributes: &[(&str, String)]) {
        self.start_tag(name, attributes);
        self.buf.push_str(">\n");
        self.depth += 1;
    }

    pub fn close(&mut self, name: &str) {
        self.depth = self.depth.saturating_sub(1);
        self.indent();
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push_str(">\n");
    }

    /// A single-line element with escaped text content.
    pub fn leaf(&mut self, name: &str, attributes: &[(&str, String)], text: &str) {
        self.start_tag(name, attributes);
        if text.is_empty() {
            self.buf.push_str("/>\n");
            return;
        }
        self.buf.push('>');
        self.buf.push_str(&escape(text));
        self.buf.push_str("</");
        self.buf.push_str(name);
        self.buf.push_str(">\n");
    }

    pub fn finish(self) -> String {
        self.buf
    }
}
