use std::{fs, path::PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cli::Cli;

/// Runtime configuration resolved from file, env and CLI.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base directory holding the sweep database.
    pub data_dir: PathBuf,
    /// Root of the host's upload tree, for URL fallback deletion.
    pub upload_dir: PathBuf,
    /// Public base URL the upload tree is served under.
    pub upload_base_url: String,
    /// Whether soft-trashing an owner runs the same sweep as a
    /// permanent delete.
    pub delete_on_trash: bool,
    /// Whether a full uninstall keeps the audit log.
    pub keep_audit_log_on_uninstall: bool,
    /// Audit retention window in days.
    pub retention_days: u64,
    /// Whether verbose logging is enabled.
    pub logging_enabled: bool,
}

#[derive(Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    storage: FileStorage,
    #[serde(default)]
    sweep: FileSweep,
    #[serde(default)]
    logging: FileLogging,
}

#[derive(Deserialize, Default)]
struct FileStorage {
    data_dir: Option<PathBuf>,
    upload_dir: Option<PathBuf>,
    upload_base_url: Option<String>,
}

#[derive(Deserialize)]
struct FileSweep {
    #[serde(default)]
    delete_on_trash: bool,
    #[serde(default)]
    keep_audit_log_on_uninstall: bool,
    #[serde(default = "default_retention_days")]
    retention_days: u64,
}

#[derive(Deserialize)]
struct FileLogging {
    #[serde(default = "default_logging")]
    enabled: bool,
}

fn default_retention_days() -> u64 {
    30
}

fn default_logging() -> bool {
    true
}

impl Default for FileSweep {
    fn default() -> Self {
        Self {
            delete_on_trash: false,
            keep_audit_log_on_uninstall: false,
            retention_days: default_retention_days(),
        }
    }
}

impl Default for FileLogging {
    fn default() -> Self {
        Self {
            enabled: default_logging(),
        }
    }
}

impl Config {
    /// Resolve configuration with CLI > env > file > default precedence.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut delete_on_trash = false;
        let mut keep_audit_log = false;
        let mut retention_days = default_retention_days();
        let mut logging = default_logging();
        let mut data_dir: Option<PathBuf> = None;
        let mut upload_dir: Option<PathBuf> = None;
        let mut upload_base_url: Option<String> = None;

        // config file path precedence: CLI -> ENV -> default
        let config_path = cli
            .config
            .clone()
            .or_else(|| std::env::var("SWEEP_CONFIG").ok().map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("config/sweep.toml"));

        if let Ok(bytes) = fs::read(&config_path) {
            let contents = String::from_utf8_lossy(&bytes);
            let file_cfg: FileConfig = toml::from_str(&contents).context("invalid config file")?;
            delete_on_trash = file_cfg.sweep.delete_on_trash;
            keep_audit_log = file_cfg.sweep.keep_audit_log_on_uninstall;
            retention_days = file_cfg.sweep.retention_days;
            logging = file_cfg.logging.enabled;
            data_dir = file_cfg.storage.data_dir;
            upload_dir = file_cfg.storage.upload_dir;
            upload_base_url = file_cfg.storage.upload_base_url;
        }

        // environment overrides
        if let Ok(dir) = std::env::var("SWEEP_DATA_DIR") {
            data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(dir) = std::env::var("SWEEP_UPLOAD_DIR") {
            upload_dir = Some(PathBuf::from(dir));
        }
        if let Ok(base) = std::env::var("SWEEP_UPLOAD_BASE_URL") {
            upload_base_url = Some(base);
        }
        if let Ok(v) = std::env::var("SWEEP_DELETE_ON_TRASH") {
            if let Ok(v) = v.parse::<bool>() {
                delete_on_trash = v;
            }
        }
        if let Ok(v) = std::env::var("SWEEP_RETENTION_DAYS") {
            if let Ok(v) = v.parse::<u64>() {
                retention_days = v;
            }
        }
        if let Ok(v) = std::env::var("SWEEP_LOGGING") {
            if let Ok(v) = v.parse::<bool>() {
                logging = v;
            }
        }

        // CLI overrides
        if let Some(dir) = &cli.data_dir {
            data_dir = Some(dir.clone());
        }
        if let Some(v) = cli.logging {
            logging = v;
        }

        if retention_days == 0 {
            anyhow::bail!("invalid_retention");
        }

        let data_dir = data_dir.unwrap_or_else(default_data_dir);
        let upload_dir = upload_dir.unwrap_or_else(|| data_dir.join("uploads"));
        let upload_base_url = upload_base_url
            .unwrap_or_else(|| "http://localhost/uploads".to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            data_dir,
            upload_dir,
            upload_base_url,
            delete_on_trash,
            keep_audit_log_on_uninstall: keep_audit_log,
            retention_days,
            logging_enabled: logging,
        })
    }

    /// Location of the sweep database inside the data directory.
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("sweep.db")
    }
}

/// Default data directory when neither file, env nor CLI names one.
pub fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("HOME") {
        let mut p = PathBuf::from(home);
        p.push(".local/share/sweepcore");
        p
    } else {
        PathBuf::from("./sweep_data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn clear_env() {
        for key in [
            "SWEEP_CONFIG",
            "SWEEP_DATA_DIR",
            "SWEEP_UPLOAD_DIR",
            "SWEEP_UPLOAD_BASE_URL",
            "SWEEP_DELETE_ON_TRASH",
            "SWEEP_RETENTION_DAYS",
            "SWEEP_LOGGING",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn valid_config_parses() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(
            &path,
            "[sweep]\ndelete_on_trash=true\nretention_days=7\n[logging]\nenabled=false\n",
        )
        .unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert!(cfg.delete_on_trash);
        assert_eq!(cfg.retention_days, 7);
        assert!(!cfg.logging_enabled);
    }

    #[test]
    #[serial]
    fn zero_retention_fails() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[sweep]\nretention_days=0\n").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        assert!(Config::load(&cli).is_err());
    }

    #[test]
    #[serial]
    fn missing_keys_use_defaults() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "").unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert!(!cfg.delete_on_trash);
        assert!(!cfg.keep_audit_log_on_uninstall);
        assert_eq!(cfg.retention_days, 30);
        assert_eq!(cfg.upload_dir, cfg.data_dir.join("uploads"));
    }

    #[test]
    #[serial]
    fn precedence_env_over_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(&path, "[sweep]\nretention_days=10\n").unwrap();
        std::env::set_var("SWEEP_RETENTION_DAYS", "20");
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.retention_days, 20);
        std::env::remove_var("SWEEP_RETENTION_DAYS");
    }

    #[test]
    #[serial]
    fn base_url_trailing_slash_is_trimmed() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cfg.toml");
        fs::write(
            &path,
            "[storage]\nupload_base_url=\"http://s/uploads/\"\n",
        )
        .unwrap();
        let cli = Cli {
            config: Some(path),
            ..Default::default()
        };
        let cfg = Config::load(&cli).unwrap();
        assert_eq!(cfg.upload_base_url, "http://s/uploads");
    }
}
