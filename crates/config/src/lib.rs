//! Configuration loading, validation, and management for Goalward.
//!
//! Loads configuration from `~/.goalward/config.toml` (or an explicit path)
//! with environment variable overrides. Validates all settings at startup.

use chrono::NaiveDate;
use goalward_core::goal::Goal;
use goalward_memory::ScoringPolicy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.goalward/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// The goal this agent pursues
    #[serde(default)]
    pub goal: GoalConfig,

    /// Reasoning-service connection
    #[serde(default)]
    pub reasoner: ReasonerConfig,

    /// Decision engine tunables
    #[serde(default)]
    pub engine: EngineConfig,

    /// Cycle timing
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Note and decision storage
    #[serde(default)]
    pub memory: MemoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalConfig {
    #[serde(default = "default_goal_id")]
    pub id: String,

    #[serde(default = "default_goal_description")]
    pub description: String,

    #[serde(default)]
    pub success_criteria: Vec<String>,

    /// Measurable targets, e.g. `weekly_km = 30`
    #[serde(default)]
    pub target_metrics: BTreeMap<String, serde_json::Value>,

    /// Deadline as `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

fn default_goal_id() -> String {
    "default".into()
}
fn default_goal_description() -> String {
    "Describe the goal the agent should work toward".into()
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            id: default_goal_id(),
            description: default_goal_description(),
            success_criteria: Vec::new(),
            target_metrics: BTreeMap::new(),
            due_date: None,
        }
    }
}

impl GoalConfig {
    pub fn to_goal(&self) -> Goal {
        let mut goal = Goal::new(self.description.clone()).with_id(self.id.clone());
        for criterion in &self.success_criteria {
            goal = goal.with_criterion(criterion.clone());
        }
        for (name, target) in &self.target_metrics {
            goal = goal.with_metric(name.clone(), target.clone());
        }
        if let Some(due) = self.due_date {
            goal = goal.with_due_date(due);
        }
        goal
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonerConfig {
    /// Name used in logs
    #[serde(default = "default_reasoner_name")]
    pub name: String,

    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: Option<u32>,

    /// Per-request timeout
    #[serde(default = "default_reasoner_timeout")]
    pub timeout_secs: u64,
}

fn default_reasoner_name() -> String {
    "openai".into()
}
fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_tokens() -> Option<u32> {
    Some(1024)
}
fn default_reasoner_timeout() -> u64 {
    60
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            name: default_reasoner_name(),
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_reasoner_timeout(),
        }
    }
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for ReasonerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReasonerConfig")
            .field("name", &self.name)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Longest accepted context window (ten years).
pub const MAX_CONTEXT_WINDOW_HOURS: u64 = 87_600;

/// Longest accepted interval or interval hint (one year).
pub const MAX_INTERVAL_SECS: u64 = 31_536_000;

/// Longest accepted reasoner or tool timeout.
pub const MAX_TIMEOUT_SECS: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum notes sent with each request
    #[serde(default = "default_context_limit")]
    pub context_limit: usize,

    /// How far back context is drawn from
    #[serde(default = "default_context_window_hours")]
    pub context_window_hours: u64,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_context_limit() -> usize {
    20
}
fn default_context_window_hours() -> u64 {
    168
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_base_delay_ms() -> u64 {
    2_000
}
fn default_retry_max_delay_ms() -> u64 {
    30_000
}
fn default_tool_timeout_secs() -> u64 {
    30
}

impl EngineConfig {
    /// The context window as a duration, capped at [`MAX_CONTEXT_WINDOW_HOURS`].
    pub fn context_window(&self) -> chrono::Duration {
        let hours = self.context_window_hours.min(MAX_CONTEXT_WINDOW_HOURS);
        i64::try_from(hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or_else(|| chrono::Duration::days(3_650))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            context_limit: default_context_limit(),
            context_window_hours: default_context_window_hours(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_base_interval_secs")]
    pub base_interval_secs: u64,

    #[serde(default = "default_max_interval_secs")]
    pub max_interval_secs: u64,

    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Shortest `next_check` hint honoured
    #[serde(default = "default_min_hint_secs")]
    pub min_hint_secs: u64,

    /// Longest `next_check` hint honoured
    #[serde(default = "default_max_hint_secs")]
    pub max_hint_secs: u64,
}

fn default_base_interval_secs() -> u64 {
    3_600
}
fn default_max_interval_secs() -> u64 {
    86_400
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_min_hint_secs() -> u64 {
    300
}
fn default_max_hint_secs() -> u64 {
    86_400
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval_secs: default_base_interval_secs(),
            max_interval_secs: default_max_interval_secs(),
            backoff_multiplier: default_backoff_multiplier(),
            min_hint_secs: default_min_hint_secs(),
            max_hint_secs: default_max_hint_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackend {
    #[default]
    Sqlite,
    InMemory,
}

impl std::fmt::Display for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryBackend::Sqlite => write!(f, "sqlite"),
            MemoryBackend::InMemory => write!(f, "in_memory"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackend,

    /// Database file; defaults to `~/.goalward/goalward.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Note importance scoring
    #[serde(default)]
    pub scoring: ScoringPolicy,
}

impl MemoryConfig {
    /// The database path, with the default applied.
    pub fn db_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| AppConfig::config_dir().join("goalward.db"))
    }
}

impl AppConfig {
    /// Load configuration from `path`, or from the default location when
    /// `None`, then apply environment overrides:
    /// - `GOALWARD_API_KEY` (falls back to `OPENAI_API_KEY`)
    /// - `GOALWARD_MODEL`
    /// - `GOALWARD_API_URL`
    /// - `GOALWARD_DB_PATH`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(Self::default_path);
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `var`. An API key from the file
    /// wins over `OPENAI_API_KEY` but not over `GOALWARD_API_KEY`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GOALWARD_API_KEY") {
            self.reasoner.api_key = Some(key);
        } else if self.reasoner.api_key.is_none() {
            self.reasoner.api_key = non_empty("OPENAI_API_KEY");
        }

        if let Some(model) = non_empty("GOALWARD_MODEL") {
            self.reasoner.model = model;
        }

        if let Some(url) = non_empty("GOALWARD_API_URL") {
            self.reasoner.api_url = url;
        }

        if let Some(path) = non_empty("GOALWARD_DB_PATH") {
            self.memory.path = Some(PathBuf::from(path));
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".goalward")
    }

    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| -> Result<(), ConfigError> {
            Err(ConfigError::ValidationError(msg.into()))
        };

        if self.goal.id.trim().is_empty() {
            return invalid("goal.id must not be empty");
        }
        if self.goal.description.trim().is_empty() {
            return invalid("goal.description must not be empty");
        }

        if !(0.0..=2.0).contains(&self.reasoner.temperature) {
            return invalid("reasoner.temperature must be between 0.0 and 2.0");
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.reasoner.timeout_secs) {
            return invalid("reasoner.timeout_secs must be between 1 and 3600");
        }

        if self.engine.context_limit == 0 {
            return invalid("engine.context_limit must be > 0");
        }
        if !(1..=MAX_CONTEXT_WINDOW_HOURS).contains(&self.engine.context_window_hours) {
            return invalid("engine.context_window_hours must be between 1 and 87600");
        }
        if self.engine.max_attempts == 0 {
            return invalid("engine.max_attempts must be >= 1");
        }
        if self.engine.retry_base_delay_ms > self.engine.retry_max_delay_ms {
            return invalid("engine.retry_base_delay_ms must not exceed retry_max_delay_ms");
        }
        if self.engine.retry_max_delay_ms > MAX_TIMEOUT_SECS * 1_000 {
            return invalid("engine.retry_max_delay_ms must not exceed one hour");
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.engine.tool_timeout_secs) {
            return invalid("engine.tool_timeout_secs must be between 1 and 3600");
        }

        let s = &self.scheduler;
        if s.base_interval_secs == 0 {
            return invalid("scheduler.base_interval_secs must be > 0");
        }
        if s.max_interval_secs < s.base_interval_secs {
            return invalid("scheduler.max_interval_secs must be >= base_interval_secs");
        }
        if s.max_interval_secs > MAX_INTERVAL_SECS || s.max_hint_secs > MAX_INTERVAL_SECS {
            return invalid("scheduler intervals must not exceed one year (31536000s)");
        }
        if !s.backoff_multiplier.is_finite() || s.backoff_multiplier < 1.0 {
            return invalid("scheduler.backoff_multiplier must be >= 1.0");
        }
        if s.min_hint_secs > s.max_hint_secs {
            return invalid("scheduler.min_hint_secs must not exceed max_hint_secs");
        }

        let scoring = &self.memory.scoring;
        let weights = [
            scoring.recency_weight,
            scoring.category_weight,
            scoring.novelty_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return invalid("memory.scoring weights must be non-negative");
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return invalid("memory.scoring weights must sum to > 0");
        }
        if !scoring.half_life_hours.is_finite() || scoring.half_life_hours <= 0.0 {
            return invalid("memory.scoring.half_life_hours must be > 0");
        }
        let in_unit = |w: f64| (0.0..=1.0).contains(&w);
        if !in_unit(scoring.default_category_weight)
            || !scoring.category_weights.values().all(|w| in_unit(*w))
        {
            return invalid("memory.scoring category weights must be within [0, 1]");
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.reasoner.api_key.is_some()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
