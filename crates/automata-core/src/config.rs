//! `EngineConfig` discovery and loading.
//!
//! Mirrors `core-config`'s `ConfigFile`/`Config` split: `ConfigFile` is the
//! raw, directly-deserialized shape of `oxidized-automata.toml`; the
//! effective [`EngineConfig`] is assembled from it plus caller-supplied
//! overrides (CLI flags take precedence over the file, matching
//! `core-config::load_from` composed with `ox-bin::Args::config`).

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::EngineKind;

/// The raw, optional shape of `oxidized-automata.toml`. Every field is
/// optional so a partially-specified file (or none at all) still parses.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ConfigFile {
    #[serde(default)]
    pub workers: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub engine: Option<EngineKind>,
}

/// Best-effort config path discovery: a local `oxidized-automata.toml`
/// first, then the platform config directory, following `core-config::discover`.
pub fn discover() -> PathBuf {
    let local = PathBuf::from("oxidized-automata.toml");
    if local.exists() {
        return local;
    }
    if let Some(dir) = dirs::config_dir() {
        return dir.join("oxidized-automata").join("oxidized-automata.toml");
    }
    PathBuf::from("oxidized-automata.toml")
}

/// Loads a [`ConfigFile`] from `path`, or from [`discover`] when `path` is
/// `None`. A missing or unparsable file falls back to
/// [`ConfigFile::default`] rather than failing the run — configuration is
/// an optional convenience, not a required input.
pub fn load_from(path: Option<PathBuf>) -> ConfigFile {
    let path = path.unwrap_or_else(discover);
    match fs::read_to_string(&path) {
        Ok(content) => match toml::from_str::<ConfigFile>(&content) {
            Ok(file) => {
                debug!(target: "config", path = %path.display(), "config_loaded");
                file
            }
            Err(e) => {
                warn!(target: "config", path = %path.display(), error = %e, "config_parse_failed_using_defaults");
                ConfigFile::default()
            }
        },
        Err(_) => ConfigFile::default(),
    }
}

/// The effective parameters used to build an [`crate::Engine`]: the file's
/// values, each overridden by a caller-supplied `Some` (CLI flags win).
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub workers: usize,
    pub seed: Option<u64>,
    pub kind: EngineKind,
}

impl EngineConfig {
    /// Combines a parsed [`ConfigFile`] with explicit overrides. `workers`
    /// has no file-independent default; the caller (the CLI's positional
    /// argument) always supplies a fallback.
    pub fn resolve(
        file: &ConfigFile,
        workers_fallback: usize,
        workers_override: Option<usize>,
        seed_override: Option<u64>,
        kind_override: Option<EngineKind>,
    ) -> Self {
        let workers = workers_override
            .or(file.workers)
            .unwrap_or(workers_fallback);
        let seed = seed_override.or(file.seed);
        let kind = kind_override.or(file.engine).unwrap_or(EngineKind::Halo);
        Self {
            workers,
            seed,
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let file = load_from(Some(PathBuf::from("/nonexistent/oxidized-automata.toml")));
        assert!(file.workers.is_none());
        assert!(file.seed.is_none());
    }

    #[test]
    fn parses_a_well_formed_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "workers = 4\nseed = 7\nengine = \"shared\"").unwrap();
        let file = load_from(Some(tmp.path().to_path_buf()));
        assert_eq!(file.workers, Some(4));
        assert_eq!(file.seed, Some(7));
        assert_eq!(file.engine, Some(EngineKind::Shared));
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        writeln!(tmp, "workers = \"not a number\"").unwrap();
        let file = load_from(Some(tmp.path().to_path_buf()));
        assert!(file.workers.is_none());
    }

    #[test]
    fn overrides_win_over_file_values() {
        let file = ConfigFile {
            workers: Some(2),
            seed: Some(1),
            engine: Some(EngineKind::Shared),
        };
        let resolved = EngineConfig::resolve(&file, 1, Some(8), None, Some(EngineKind::Halo));
        assert_eq!(resolved.workers, 8);
        assert_eq!(resolved.seed, Some(1));
        assert_eq!(resolved.kind, EngineKind::Halo);
    }

    #[test]
    fn falls_back_to_worker_count_when_file_and_override_absent() {
        let resolved = EngineConfig::resolve(&ConfigFile::default(), 3, None, None, None);
        assert_eq!(resolved.workers, 3);
        assert_eq!(resolved.kind, EngineKind::Halo);
    }
}
