use std::{
    collections::HashSet,
    path::{Component, Path, PathBuf},
    time::Duration,
};

use blake3::Hash;
use glob::{GlobError, PatternError, glob};
use thiserror::Error;
use tracing::warn;

use crate::{error::ConfigError, stat::StatProvider};

#[derive(Debug, Error)]
pub enum FileError {
    #[error("Invalid glob pattern: {0}")]
    GlobPattern(#[from] PatternError),
    #[error("Failed to expand glob: {0}")]
    GlobExpansion(#[from] GlobError),
}

/// Parses a humantime duration. `"0"` and the empty string mean "no timeout".
pub fn parse_timeout(value: &str) -> Result<Option<Duration>, ConfigError> {
    if value == "0" || value.is_empty() {
        return Ok(None);
    }

    value
        .parse::<humantime::Duration>()
        .map(|duration| Some(duration.into()))
        .map_err(|source| ConfigError::InvalidTimeout {
            value: value.to_string(),
            source,
        })
}

/// Expands glob patterns into the files they match. Plain paths are kept as
/// given, whether or not they exist yet.
pub fn expand_globs(paths: &[PathBuf]) -> Result<Vec<PathBuf>, FileError> {
    let mut result = Vec::new();
    let mut seen = HashSet::new();

    for path in paths {
        let path_str = path.to_string_lossy();

        if is_glob_pattern(&path_str) {
            let mut matched = glob(&path_str)?.collect::<Result<Vec<_>, _>>()?;
            matched.retain(|p| p.is_file());
            if matched.is_empty() {
                warn!(pattern = %path_str, "glob matched no files");
            }
            for expanded in matched {
                let expanded = normalize_path(&expanded);
                if seen.insert(expanded.clone()) {
                    result.push(expanded);
                }
            }
        } else {
            let path = normalize_path(path);
            if seen.insert(path.clone()) {
                result.push(path);
            }
        }
    }

    Ok(result)
}

fn is_glob_pattern(path: &str) -> bool {
    path.contains('*') || path.contains('?') || path.contains('[')
}

/// Lexical cleanup so `./a/b` and `a/b` name the same dependency.
pub fn normalize_path(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();

    if normalized.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        normalized
    }
}

/// Content fingerprint of a set of files. Order-independent; each file is
/// keyed by its path so renames change the fingerprint.
pub fn hash_files(stat: &dyn StatProvider, files: &[PathBuf]) -> std::io::Result<Hash> {
    let mut sorted_files = files.to_vec();
    sorted_files.sort();
    sorted_files.dedup();

    let mut combined_hash_data = Vec::with_capacity(sorted_files.len() * 32);

    for file_path in &sorted_files {
        let contents = stat.read(file_path)?;
        let path_str = file_path.to_string_lossy();

        let mut hasher = blake3::Hasher::new();
        hasher.update(format!("{}:{}", path_str.len(), path_str).as_bytes());
        hasher.update(&contents);
        combined_hash_data.extend_from_slice(hasher.finalize().as_bytes());
    }

    Ok(blake3::hash(&combined_hash_data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stat::mock::MockStat;

    #[test]
    fn zero_timeout_disables() {
        assert_eq!(parse_timeout("0").unwrap(), None);
        assert_eq!(parse_timeout("").unwrap(), None);
    }

    #[test]
    fn parses_compound_durations() {
        assert_eq!(
            parse_timeout("1h30m").unwrap(),
            Some(Duration::from_secs(90 * 60))
        );
    }

    #[test]
    fn rejects_garbage_timeout() {
        assert!(matches!(
            parse_timeout("soon"),
            Err(ConfigError::InvalidTimeout { .. })
        ));
    }

    #[test]
    fn normalize_strips_current_dir() {
        assert_eq!(normalize_path(Path::new("./a/./b")), PathBuf::from("a/b"));
        assert_eq!(normalize_path(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn plain_paths_survive_expansion_even_when_missing() {
        let expanded = expand_globs(&[
            PathBuf::from("./does-not-exist.in"),
            PathBuf::from("does-not-exist.in"),
        ])
        .unwrap();
        assert_eq!(expanded, vec![PathBuf::from("does-not-exist.in")]);
    }

    #[test]
    fn fingerprint_ignores_order_but_not_content() {
        let stat = MockStat::new();
        stat.write("a.txt", "alpha");
        stat.write("b.txt", "beta");

        let forward = hash_files(&stat, &["a.txt".into(), "b.txt".into()]).unwrap();
        let reverse = hash_files(&stat, &["b.txt".into(), "a.txt".into()]).unwrap();
        assert_eq!(forward, reverse);

        stat.write("b.txt", "gamma");
        let changed = hash_files(&stat, &["a.txt".into(), "b.txt".into()]).unwrap();
        assert_ne!(forward, changed);
    }

    #[test]
    fn fingerprint_fails_on_missing_file() {
        let stat = MockStat::new();
        assert!(hash_files(&stat, &["nope".into()]).is_err());
    }
}
