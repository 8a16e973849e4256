use crate::error::{Error, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ftp,
    Sftp,
}

impl Protocol {
    pub const fn default_port(self) -> u16 {
        match self {
            Self::Ftp => 21,
            Self::Sftp => 22,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Self::Ftp => "ftp",
            Self::Sftp => "sftp",
        })
    }
}

/// One remote endpoint. The password is never written back to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferConfig {
    pub protocol: Protocol,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    #[serde(default)]
    pub root: String,
}

impl TransferConfig {
    pub fn new(
        protocol: Protocol,
        host: impl Into<String>,
        port: u16,
        username: impl Into<String>,
        password: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            protocol,
            host: host.into(),
            port,
            username: username.into(),
            password: password.into(),
            root: root.into(),
        }
    }

    /// Checks that every field needed to open a session is populated.
    pub fn validate(&self) -> Result<()> {
        let blank = [
            ("host", &self.host),
            ("username", &self.username),
            ("password", &self.password),
            ("root", &self.root),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());

        if let Some((field, _)) = blank {
            return Err(Error::configuration(format!(
                "cannot connect: '{}' is not configured",
                field
            )));
        }
        if self.port == 0 {
            return Err(Error::configuration(
                "cannot connect: 'port' is not configured",
            ));
        }
        Ok(())
    }

    /// `user@host:port`, used to tag log lines.
    pub fn endpoint(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }
}

/// Named endpoints, persisted as JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    #[serde(default)]
    pub endpoints: BTreeMap<String, TransferConfig>,
}

impl Settings {
    pub fn load() -> anyhow::Result<Self> {
        match Self::config_path() {
            Some(config_path) => Self::load_from(&config_path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&content)?;
        Ok(settings)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(config_path) = Self::config_path() {
            self.save_to(&config_path)?;
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "ftp-kit", "ftp-kit")
            .map(|dirs| dirs.config_dir().join("endpoints.json"))
    }
}
