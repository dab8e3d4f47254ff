//! Wiring shared by the commands: config → store → tools → reasoner → engine.

use goalward_agent::{DecisionEngine, EngineSettings, IntervalPolicy, RetryPolicy};
use goalward_config::{AppConfig, MemoryBackend};
use goalward_core::error::StorageError;
use goalward_core::memory::MemoryStore;
use goalward_core::reasoner::Reasoner;
use goalward_core::todo::TodoStore;
use goalward_memory::{InMemoryStore, SqliteStore};
use goalward_providers::{OpenAiCompatReasoner, OpenAiCompatSettings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load(path).map_err(|e| format!("Failed to load config: {e}"))?)
}

/// One backend seen through both store traits.
#[derive(Clone)]
pub struct Stores {
    pub memory: Arc<dyn MemoryStore>,
    pub todos: Arc<dyn TodoStore>,
}

impl Stores {
    fn over<S: MemoryStore + TodoStore + 'static>(backend: Arc<S>) -> Self {
        Self {
            memory: backend.clone(),
            todos: backend,
        }
    }
}

pub async fn open_store(config: &AppConfig) -> Result<Stores, StorageError> {
    let policy = config.memory.scoring.clone();
    match config.memory.backend {
        MemoryBackend::InMemory => Ok(Stores::over(Arc::new(InMemoryStore::with_policy(policy)))),
        MemoryBackend::Sqlite => {
            let path = config.memory.db_path();
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!(
                        "Cannot create {}: {e}",
                        parent.display()
                    ))
                })?;
            }
            let store = SqliteStore::new(&path.to_string_lossy(), policy).await?;
            info!(path = %path.display(), "SQLite store opened");
            Ok(Stores::over(Arc::new(store)))
        }
    }
}

pub fn engine_settings(config: &AppConfig) -> EngineSettings {
    EngineSettings {
        context_limit: config.engine.context_limit,
        context_window: config.engine.context_window(),
        retry: RetryPolicy {
            max_attempts: config.engine.max_attempts,
            base_delay: Duration::from_millis(config.engine.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.engine.retry_max_delay_ms),
            attempt_timeout: Duration::from_secs(config.reasoner.timeout_secs),
        },
    }
}

pub fn interval_policy(config: &AppConfig) -> IntervalPolicy {
    let s = &config.scheduler;
    IntervalPolicy {
        base: Duration::from_secs(s.base_interval_secs),
        max_interval: Duration::from_secs(s.max_interval_secs),
        backoff_multiplier: s.backoff_multiplier,
        min_hint: Duration::from_secs(s.min_hint_secs),
        max_hint: Duration::from_secs(s.max_hint_secs),
    }
}

pub fn reasoner(config: &AppConfig) -> Result<Arc<dyn Reasoner>, Box<dyn std::error::Error>> {
    let api_key = config.reasoner.api_key.clone().ok_or(
        "No API key configured. Set GOALWARD_API_KEY (or OPENAI_API_KEY), \
         or add api_key under [reasoner] in the config file.",
    )?;
    let reasoner = OpenAiCompatReasoner::new(OpenAiCompatSettings {
        name: config.reasoner.name.clone(),
        base_url: config.reasoner.api_url.clone(),
        api_key,
        model: config.reasoner.model.clone(),
        temperature: config.reasoner.temperature,
        max_tokens: config.reasoner.max_tokens,
        timeout: Duration::from_secs(config.reasoner.timeout_secs),
    })?;
    Ok(Arc::new(reasoner))
}

/// Assemble a ready-to-run engine over `stores`.
pub fn build_engine(
    config: &AppConfig,
    stores: Stores,
    reasoner: Arc<dyn Reasoner>,
) -> Result<DecisionEngine, Box<dyn std::error::Error>> {
    let registry = goalward_tools::default_registry(
        stores.memory.clone(),
        stores.todos,
        Duration::from_secs(config.engine.tool_timeout_secs),
    )?;
    info!(tools = registry.len(), "Tool registry ready");

    Ok(DecisionEngine::new(
        config.goal.to_goal(),
        stores.memory,
        Arc::new(registry),
        reasoner,
        engine_settings(config),
    ))
}
