//! Configuration management for speakboard.
//!
//! Loads config from a YAML file in standard locations. Every section and
//! field has a default, so a partial file (or none at all) is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Take the submitter id from `X-Forwarded-For` when present.
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 3000,
            trust_forwarded_for: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub audio_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            audio_dir: PathBuf::from("public/audio"),
        }
    }
}

impl StorageConfig {
    pub fn messages_path(&self) -> PathBuf {
        self.data_dir.join("messages.json")
    }

    pub fn bans_path(&self) -> PathBuf {
        self.data_dir.join("banned.json")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    pub language: String,
    pub host: String,
    pub timeout_secs: u64,
    pub max_text_chars: usize,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en".into(),
            host: "https://translate.google.com".into(),
            timeout_secs: 30,
            max_text_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Peer addresses allowed on `/admin/*`. Empty means unrestricted.
    pub allowed_ips: Vec<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            allowed_ips: vec!["127.0.0.1".into(), "::1".into()],
        }
    }
}

impl AdminConfig {
    pub fn allows(&self, peer: &str) -> bool {
        self.allowed_ips.is_empty() || self.allowed_ips.iter().any(|ip| ip == peer)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    pub capacity: usize,
    pub keep_alive_secs: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            keep_alive_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub speech: SpeechConfig,
    pub admin: AdminConfig,
    pub broadcast: BroadcastConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./config.yaml
    /// 2. ~/.config/speakboard/config.yaml
    /// 3. /etc/speakboard/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("config.yaml")),
                dirs::config_dir().map(|c| c.join("speakboard/config.yaml")),
                Some(PathBuf::from("/etc/speakboard/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::parse(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_other_defaults() {
        let config = Config::parse(
            "server:\n  port: 8080\nspeech:\n  language: de\nadmin:\n  allowed_ips: []\n",
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.speech.language, "de");
        assert_eq!(config.speech.max_text_chars, 500);
        assert!(config.admin.allows("203.0.113.9"));
    }

    #[test]
    fn default_admin_list_is_loopback_only() {
        let admin = AdminConfig::default();
        assert!(admin.allows("127.0.0.1"));
        assert!(!admin.allows("10.0.0.2"));
    }

    #[test]
    fn missing_explicit_path_falls_back_to_defaults() {
        let config = Config::load(Some(Path::new("/nonexistent/speakboard.yaml")));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn storage_paths_live_under_data_dir() {
        let storage = StorageConfig {
            data_dir: PathBuf::from("/srv/board"),
            ..StorageConfig::default()
        };
        assert_eq!(storage.messages_path(), PathBuf::from("/srv/board/messages.json"));
        assert_eq!(storage.bans_path(), PathBuf::from("/srv/board/banned.json"));
    }
}
