// Configuration records persisted by the local config manager.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

/// One persisted configuration. Never modified after it is written.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ConfigRecord {
    pub id: i64,
    pub config: String,
    pub comment: String,
    pub created_at: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
struct StoreState {
    records: Vec<ConfigRecord>,
    default_config_id: i64,
}

impl StoreState {
    fn next_id(&self) -> i64 {
        self.records.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }
}

/// Configuration records plus the default pointer, optionally mirrored to a
/// JSON file after every change.
pub struct ConfigStore {
    path: Option<PathBuf>,
    state: Mutex<StoreState>,
}

impl ConfigStore {
    /// Creates a store that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(StoreState::default()),
        }
    }

    /// Opens a file-backed store, loading existing records when the file exists.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match fs::read_to_string(&path).await {
            Ok(data) => serde_json::from_str(&data)
                .with_context(|| format!("unmarshal config store {:?}", path))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => StoreState::default(),
            Err(err) => {
                return Err(err).with_context(|| format!("read config store {:?}", path));
            }
        };

        info!(
            component = "config-store",
            event = "opened",
            path = ?path,
            records = state.records.len(),
            default_config_id = state.default_config_id,
            "config store opened"
        );

        Ok(Self {
            path: Some(path),
            state: Mutex::new(state),
        })
    }

    pub async fn default_config_id(&self) -> i64 {
        self.state.lock().await.default_config_id
    }

    /// Appends a record and returns its ID.
    pub async fn add(&self, config: &str, comment: &str) -> Result<i64> {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.records.push(ConfigRecord {
            id,
            config: config.to_string(),
            comment: comment.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        });
        if let Err(err) = self.persist(&state).await {
            state.records.pop();
            return Err(err);
        }
        Ok(id)
    }

    /// Points the default at an existing record.
    pub async fn set_default(&self, config_id: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        if !state.records.iter().any(|r| r.id == config_id) {
            bail!("configuration {} does not exist", config_id);
        }
        let previous = state.default_config_id;
        state.default_config_id = config_id;
        if let Err(err) = self.persist(&state).await {
            state.default_config_id = previous;
            return Err(err);
        }
        Ok(())
    }

    pub async fn get(&self, config_id: i64) -> Option<ConfigRecord> {
        let state = self.state.lock().await;
        state.records.iter().find(|r| r.id == config_id).cloned()
    }

    pub async fn list(&self) -> Vec<ConfigRecord> {
        self.state.lock().await.records.clone()
    }

    /// Writes through a temporary file so readers never see a torn document.
    async fn persist(&self, state: &StoreState) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .with_context(|| format!("create config store dir {:?}", dir))?;
        }
        let data = serde_json::to_vec_pretty(state).context("marshal config store")?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, data)
            .await
            .with_context(|| format!("write config store {:?}", tmp))?;
        fs::rename(&tmp, path)
            .await
            .with_context(|| format!("rename config store {:?} -> {:?}", tmp, path))?;
        Ok(())
    }
}
