use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const DEFAULT_STATE_DIR: &str = ".";
const STATE_FILENAME: &str = "doer_state.json";

/// Dependency fingerprints of each task's last successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {
    #[serde(default)]
    fingerprints: BTreeMap<String, String>,
}

impl Cache {
    pub fn get(&self, task: &str) -> Option<&str> {
        self.fingerprints.get(task).map(String::as_str)
    }

    pub fn matches(&self, task: &str, fingerprint: &str) -> bool {
        self.get(task) == Some(fingerprint)
    }

    /// Returns whether the stored value changed.
    pub fn record(&mut self, task: &str, fingerprint: String) -> bool {
        if self.matches(task, &fingerprint) {
            return false;
        }
        self.fingerprints.insert(task.to_string(), fingerprint);
        true
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

pub fn load_cache(state_dir: Option<&Path>, config_path: &Path) -> Cache {
    let cache_path = get_cache_path(state_dir, config_path);

    let file = match File::open(&cache_path) {
        Ok(file) => file,
        Err(_) => return Cache::default(),
    };

    let reader = BufReader::new(file);
    serde_json::from_reader(reader).unwrap_or_else(|e| {
        warn!(
            "Ignoring unreadable state file '{}': {}",
            cache_path.display(),
            e
        );
        Cache::default()
    })
}

pub fn save_cache(cache: &Cache, state_dir: Option<&Path>, config_path: &Path) {
    let cache_path = get_cache_path(state_dir, config_path);

    if let Some(parent) = cache_path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create state directory: {}", e);
            return;
        }
    }

    match File::create(&cache_path) {
        Ok(file) => {
            let writer = BufWriter::new(file);
            if let Err(e) = serde_json::to_writer_pretty(writer, cache) {
                warn!("Failed to write state file: {}", e);
            } else {
                debug!(path = %cache_path.display(), "saved state");
            }
        }
        Err(e) => {
            warn!("Failed to open state file for writing: {}", e);
        }
    }
}

fn get_cache_path(state_dir: Option<&Path>, config_path: &Path) -> PathBuf {
    let config_parent = config_path.parent().unwrap_or_else(|| Path::new("."));

    let state_dir = state_dir.unwrap_or(Path::new(DEFAULT_STATE_DIR));

    let state_dir_path = if state_dir.is_absolute() {
        state_dir.to_path_buf()
    } else {
        config_parent.join(state_dir)
    };

    state_dir_path.join(STATE_FILENAME)
}
