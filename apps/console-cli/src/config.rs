//! Console configuration management.
//!
//! Configuration is stored as TOML at `~/.config/pteroconsole/console.toml`
//! (or `%APPDATA%/pteroconsole/console.toml` on Windows). `PTEROCONSOLE_CONFIG`
//! points at a different file. Each field can be overridden by a
//! `PTEROCONSOLE_*` environment variable; anything still missing is asked
//! for on stdin and written back.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Console configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Panel base URL, e.g. `https://panel.example.com`.
    #[serde(default)]
    pub panel_url: String,

    /// Client API key (`ptlc_…`).
    #[serde(default)]
    pub client_key: String,

    /// Server identifier as shown in the panel URL.
    #[serde(default)]
    pub server_id: String,
}

/// Field name, environment variable and prompt label.
const FIELDS: [(&str, &str, &str); 3] = [
    ("panel_url", "PTEROCONSOLE_PANEL_URL", "Panel URL"),
    ("client_key", "PTEROCONSOLE_CLIENT_KEY", "Client API key"),
    ("server_id", "PTEROCONSOLE_SERVER_ID", "Server ID"),
];

impl Config {
    /// Loads configuration from disk and the environment, prompting for
    /// anything missing.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();
        let mut config = Self::read_from(&path)?;
        config.apply_env(|name| std::env::var(name).ok());

        let stdin = std::io::stdin();
        let mut input = stdin.lock();
        let prompted = config.fill_missing(|label| prompt(&mut input, label))?;
        if prompted {
            config.save_to(&path)?;
        }
        Ok(config)
    }

    /// Reads a config file. A missing file yields an empty config.
    pub fn read_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Writes the config with owner-only permissions.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Overrides fields with non-empty environment values.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        for (field, var, _) in FIELDS {
            let value = lookup(var).map(|v| v.trim().to_string()).unwrap_or_default();
            if !value.is_empty() {
                *self.field_mut(field) = value;
            }
        }
    }

    /// Asks for every empty field. Returns whether anything was asked.
    fn fill_missing(
        &mut self,
        mut ask: impl FnMut(&str) -> anyhow::Result<String>,
    ) -> anyhow::Result<bool> {
        let mut asked = false;
        for (field, _, label) in FIELDS {
            while self.field_mut(field).is_empty() {
                *self.field_mut(field) = ask(label)?.trim().to_string();
                asked = true;
            }
        }
        Ok(asked)
    }

    fn field_mut(&mut self, field: &str) -> &mut String {
        match field {
            "panel_url" => &mut self.panel_url,
            "client_key" => &mut self.client_key,
            _ => &mut self.server_id,
        }
    }
}

fn prompt(input: &mut impl BufRead, label: &str) -> anyhow::Result<String> {
    let mut stderr = std::io::stderr();
    write!(stderr, "{label}: ")?;
    stderr.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        anyhow::bail!("stdin closed while reading {label}");
    }
    Ok(line)
}

/// Returns the configuration file path.
fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("PTEROCONSOLE_CONFIG") {
        return PathBuf::from(path);
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata)
            .join("pteroconsole")
            .join("console.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("pteroconsole")
            .join("console.toml")
    }
}
