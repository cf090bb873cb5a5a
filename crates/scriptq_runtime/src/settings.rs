//! Settings management

use anyhow::{Context, Result};
use scriptq_script::ScriptSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Demo host settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    /// Global name the queue is published under.
    pub queue_name: String,
    pub workers: WorkerSettings,
    pub script: ScriptSettings,
    /// Script to run instead of the built-in pop/push loop. It should leave
    /// its counts in the globals `pushed` and `popped`.
    pub script_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub producers: usize,
    pub consumers: usize,
    pub items_per_producer: usize,
    /// Pop attempts per consumer. Pops on an empty queue count as attempts.
    pub pops_per_consumer: usize,
    pub script_iterations: usize,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            queue_name: "lqueue".to_string(),
            workers: WorkerSettings::default(),
            script: ScriptSettings::default(),
            script_path: None,
        }
    }
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            producers: 5,
            consumers: 5,
            items_per_producer: 100,
            pops_per_consumer: 95,
            script_iterations: 100,
        }
    }
}

impl DemoSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid settings in {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
