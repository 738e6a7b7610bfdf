//! Configuration file loading for machfile.
//!
//! Discovers and loads `machfile.toml` from the working directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use machfile_types::Tolerance;
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "machfile.toml";

/// Top-level configuration from machfile.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MachfileConfig {
    /// Structural comparison settings for `diff`.
    pub compare: CompareConfig,

    /// Material library settings for `matlib`.
    pub library: LibraryConfig,

    /// Backup settings for `migrate --in-place`.
    pub backups: BackupsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompareConfig {
    /// Absolute float tolerance.
    pub abs_tol: Option<f64>,

    /// Relative float tolerance.
    pub rel_tol: Option<f64>,

    /// Field names skipped at every depth.
    pub ignore: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Material library directory, relative to the config file.
    pub dir: Option<Utf8PathBuf>,
}

/// Backups section of the config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackupsConfig {
    /// Whether to copy a document aside before rewriting it in place.
    pub enabled: bool,

    /// Suffix for backup files.
    pub suffix: String,
}

impl Default for BackupsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            suffix: ".machfile.bak".to_string(),
        }
    }
}

/// Discover the machfile.toml config file in `root`.
pub fn discover_config(root: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = root.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a machfile.toml config file.
///
/// A relative `library.dir` is resolved against the file's directory.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<MachfileConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    let mut config =
        parse_config(&contents).with_context(|| format!("parse config file {}", path))?;
    if let (Some(dir), Some(base)) = (config.library.dir.as_mut(), path.parent()) {
        if dir.is_relative() {
            *dir = base.join(&*dir);
        }
    }
    Ok(config)
}

/// Parse a config file from a string.
pub fn parse_config(contents: &str) -> anyhow::Result<MachfileConfig> {
    let config: MachfileConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load `path` when given, else discover in `root`, else defaults.
pub fn load_or_default(root: &Utf8Path, path: Option<&Utf8Path>) -> anyhow::Result<MachfileConfig> {
    match path.map(Utf8Path::to_path_buf).or_else(|| discover_config(root)) {
        Some(path) => load_config(&path),
        None => Ok(MachfileConfig::default()),
    }
}

/// Merged configuration combining config file and CLI arguments.
#[derive(Debug, Clone, Default)]
pub struct MergedConfig {
    /// Float tolerance for `diff`.
    pub tolerance: Tolerance,

    /// Ignored field names (config file list, extended by CLI).
    pub ignore: Vec<String>,

    /// Library directory, if any was configured.
    pub library_dir: Option<Utf8PathBuf>,

    /// Backup settings.
    pub backups: BackupsConfig,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: MachfileConfig,
}

impl ConfigMerger {
    pub fn new(config: MachfileConfig) -> Self {
        Self { config }
    }

    fn base(self) -> MergedConfig {
        let defaults = Tolerance::DEFAULT;
        MergedConfig {
            tolerance: Tolerance::new(
                self.config.compare.abs_tol.unwrap_or(defaults.abs),
                self.config.compare.rel_tol.unwrap_or(defaults.rel),
            ),
            ignore: self.config.compare.ignore,
            library_dir: self.config.library.dir,
            backups: self.config.backups,
        }
    }

    /// Merge with `diff` arguments.
    ///
    /// CLI tolerances replace the config values; CLI `ignore` extends the list.
    pub fn merge_diff_args(
        self,
        cli_abs_tol: Option<f64>,
        cli_rel_tol: Option<f64>,
        cli_ignore: &[String],
    ) -> MergedConfig {
        let mut merged = self.base();
        if let Some(abs) = cli_abs_tol {
            merged.tolerance.abs = abs;
        }
        if let Some(rel) = cli_rel_tol {
            merged.tolerance.rel = rel;
        }
        for field in cli_ignore {
            if !merged.ignore.contains(field) {
                merged.ignore.push(field.clone());
            }
        }
        merged
    }

    /// Merge with `matlib` arguments. `--library` replaces the configured directory.
    pub fn merge_matlib_args(self, cli_library: Option<Utf8PathBuf>) -> MergedConfig {
        let mut merged = self.base();
        if cli_library.is_some() {
            merged.library_dir = cli_library;
        }
        merged
    }

    /// Merge with `migrate` arguments. `--no-backup` disables backups.
    pub fn merge_migrate_args(self, no_backup: bool) -> MergedConfig {
        let mut merged = self.base();
        merged.backups.enabled &= !no_backup;
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_example_config() {
        let contents = r#"
[compare]
abs_tol = 1e-9
rel_tol = 1e-6
ignore = ["desc", "path"]

[library]
dir = "materials"

[backups]
enabled = false
suffix = ".orig"
"#;

        let config = parse_config(contents).unwrap();
        assert_eq!(config.compare.abs_tol, Some(1e-9));
        assert_eq!(config.compare.rel_tol, Some(1e-6));
        assert_eq!(config.compare.ignore, vec!["desc", "path"]);
        assert_eq!(config.library.dir.as_deref(), Some(Utf8Path::new("materials")));
        assert!(!config.backups.enabled);
        assert_eq!(config.backups.suffix, ".orig");
    }

    #[test]
    fn test_parse_empty_config() {
        let config = parse_config("").unwrap();
        assert!(config.compare.ignore.is_empty());
        assert!(config.library.dir.is_none());
        assert_eq!(config.backups, BackupsConfig::default());
    }

    #[test]
    fn test_unknown_value_types_are_rejected() {
        let err = parse_config("[compare]\nabs_tol = \"tiny\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid TOML"));
    }

    #[test]
    fn test_merge_diff_args_cli_overrides_tolerance_and_extends_ignore() {
        let config = MachfileConfig {
            compare: CompareConfig {
                abs_tol: Some(1e-6),
                rel_tol: Some(1e-3),
                ignore: vec!["desc".to_string()],
            },
            ..Default::default()
        };

        let merged = ConfigMerger::new(config).merge_diff_args(
            Some(0.0),
            None,
            &["path".to_string(), "desc".to_string()],
        );

        assert_eq!(merged.tolerance.abs, 0.0);
        assert_eq!(merged.tolerance.rel, 1e-3);
        assert_eq!(merged.ignore, vec!["desc", "path"]);
    }

    #[test]
    fn test_merge_without_config_uses_default_tolerance() {
        let merged = ConfigMerger::new(MachfileConfig::default()).merge_diff_args(None, None, &[]);
        assert_eq!(merged.tolerance, Tolerance::DEFAULT);
        assert!(merged.ignore.is_empty());
    }

    #[test]
    fn test_merge_matlib_args_cli_wins() {
        let config = MachfileConfig {
            library: LibraryConfig {
                dir: Some(Utf8PathBuf::from("/configured")),
            },
            ..Default::default()
        };
        let merged = ConfigMerger::new(config.clone()).merge_matlib_args(None);
        assert_eq!(merged.library_dir, Some(Utf8PathBuf::from("/configured")));

        let merged = ConfigMerger::new(config).merge_matlib_args(Some(Utf8PathBuf::from("/cli")));
        assert_eq!(merged.library_dir, Some(Utf8PathBuf::from("/cli")));
    }

    #[test]
    fn test_merge_migrate_args_no_backup() {
        let merged = ConfigMerger::new(MachfileConfig::default()).merge_migrate_args(false);
        assert!(merged.backups.enabled);
        let merged = ConfigMerger::new(MachfileConfig::default()).merge_migrate_args(true);
        assert!(!merged.backups.enabled);
        assert_eq!(merged.backups.suffix, ".machfile.bak");
    }

    #[test]
    fn test_discover_and_resolve_library_dir() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        assert!(discover_config(&root).is_none());
        assert!(load_or_default(&root, None).unwrap().library.dir.is_none());

        std::fs::write(root.join(CONFIG_FILE_NAME), "[library]\ndir = \"lib\"\n").expect("write config");
        let config = load_or_default(&root, None).unwrap();
        assert_eq!(config.library.dir, Some(root.join("lib")));
    }
}
