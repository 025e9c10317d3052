//! File-backed scenario registry.

use std::path::{Path, PathBuf};

use mediaflow_core::scenario::{parse_scenarios, validate_all, Scenario, ScenarioError, ScenarioMap};
use tokio::sync::RwLock;

#[derive(Debug)]
pub struct ScenarioRegistry {
    path: PathBuf,
    scenarios: RwLock<ScenarioMap>,
}

impl ScenarioRegistry {
    pub fn new(path: impl Into<PathBuf>, scenarios: ScenarioMap) -> Self {
        Self {
            path: path.into(),
            scenarios: RwLock::new(scenarios),
        }
    }

    /// Load the registry from `path`. A missing file yields an empty
    /// registry; an invalid one is an error.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, ScenarioError> {
        let path = path.into();
        let scenarios = match tokio::fs::read_to_string(&path).await {
            Ok(text) => parse_scenarios(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "Scenario file not found, starting empty");
                ScenarioMap::new()
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(path = %path.display(), count = scenarios.len(), "Scenarios loaded");
        Ok(Self::new(path, scenarios))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn list(&self) -> ScenarioMap {
        self.scenarios.read().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<Scenario> {
        self.scenarios.read().await.get(id).cloned()
    }

    /// Validate and persist a complete replacement set, then swap it in.
    /// On error neither the file nor the in-memory set changes.
    pub async fn replace(&self, scenarios: ScenarioMap) -> Result<(), ScenarioError> {
        validate_all(&scenarios)?;
        let text = serde_json::to_string_pretty(&scenarios)?;

        let mut guard = self.scenarios.write().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::info!(path = %self.path.display(), count = scenarios.len(), "Scenarios replaced");
        *guard = scenarios;
        Ok(())
    }
}
