//! Application configuration: parse/write `user-roster.conf`.
//!
//! The file uses `<key> = <value>` lines. Comments (lines starting with '#')
//! and empty lines are ignored; unknown keys are skipped silently.

use std::path::{Path, PathBuf};

/// Name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "user-roster.conf";
const APP_DIR: &str = "user-roster";

/// Settings that control where users are stored and how the app behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    /// Settings file holding the persisted user list.
    pub storage_path: PathBuf,
    /// Keep storage in memory only; nothing is written to disk.
    pub ephemeral: bool,
    /// Persist the store right after every successful create.
    pub persist_on_save: bool,
    /// Default `tracing` filter directive, e.g. `info` or `user_roster=debug`.
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            ephemeral: false,
            persist_on_save: true,
            log_level: "info".to_string(),
        }
    }
}

/// `<data_dir>/user-roster/settings.json`, or `./settings.json` when the
/// platform has no data directory.
pub fn default_storage_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join(APP_DIR).join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

/// `<config_dir>/user-roster/user-roster.conf`, or the bare file name.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

impl AppConfig {
    /// Load the configuration from `path`, or write the defaults there if it
    /// does not exist yet.
    ///
    /// A file that cannot be read falls back to the defaults. Failing to
    /// write the initial file is logged and otherwise ignored.
    pub fn load_or_init(path: &Path) -> Self {
        if path.exists() {
            return Self::from_file(path).unwrap_or_default();
        }
        let cfg = Self::default();
        if let Err(e) = cfg.write_file(path) {
            tracing::warn!(path = %path.display(), error = %e, "could not write default config");
        }
        cfg
    }

    /// Load the configuration from a file, starting from the defaults.
    ///
    /// # Returns
    ///
    /// `Some(config)` if the file exists and is readable; `None` otherwise.
    pub fn from_file(path: &Path) -> Option<Self> {
        let contents = std::fs::read_to_string(path).ok()?;
        Some(Self::parse(&contents))
    }

    pub fn parse(contents: &str) -> Self {
        let mut cfg = Self::default();
        for raw in contents.lines() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.splitn(2, '=');
            let lhs = parts.next().map(|s| s.trim()).unwrap_or("");
            let rhs = parts.next().map(|s| s.trim()).unwrap_or("");
            if lhs.is_empty() || rhs.is_empty() {
                continue;
            }

            match lhs {
                "storage_path" => cfg.storage_path = PathBuf::from(rhs),
                "ephemeral" => cfg.ephemeral = parse_bool(rhs),
                "persist_on_save" => cfg.persist_on_save = parse_bool(rhs),
                "log_level" => cfg.log_level = rhs.to_string(),
                _ => {}
            }
        }
        cfg
    }

    /// Write the configuration to `path`, creating parent directories.
    pub fn write_file(&self, path: &Path) -> std::io::Result<()> {
        use std::fmt::Write as _;
        let mut buf = String::new();
        buf.push_str("# user-roster configuration\n");
        buf.push_str("# Booleans accept 1|true|yes|on; anything else is false.\n\n");

        let _ = writeln!(&mut buf, "storage_path = {}", self.storage_path.display());
        let _ = writeln!(&mut buf, "ephemeral = {}", self.ephemeral);
        let _ = writeln!(&mut buf, "persist_on_save = {}", self.persist_on_save);
        let _ = writeln!(&mut buf, "log_level = {}", self.log_level);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, buf)
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
