use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub topics: TopicsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Sent verbatim as the `Cookie` header when non-empty.
    #[serde(default)]
    pub cookie: String,
    /// Video length bucket passed as `duration`: 0 any, 1 under 10 minutes,
    /// 2 10 to 30 minutes, 3 30 to 60 minutes, 4 over 60 minutes.
    #[serde(default = "default_duration")]
    pub duration: u8,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Topics provisioned when the server starts.
    #[serde(default)]
    pub seed: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/topicboard/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(host) = overrides.host {
            self.server.host = host;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    pub fn default_template() -> String {
        let template = r#"[server]
host = "127.0.0.1"
port = 5001

[storage]
db_path = "database.db"

[search]
endpoint = "https://api.bilibili.com/x/web-interface/search/type"
user_agent = "Mozilla/5.0 (compatible; topicboard/0.1)"
cookie = ""
duration = 1
timeout_secs = 15

[topics]
# seed = ["哈基米音乐", "OI"]
seed = []
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            user_agent: default_user_agent(),
            cookie: String::new(),
            duration: default_duration(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_db_path() -> String {
    "database.db".to_string()
}

fn default_search_endpoint() -> String {
    "https://api.bilibili.com/x/web-interface/search/type".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; topicboard/0.1)".to_string()
}

fn default_duration() -> u8 {
    1
}

fn default_timeout_secs() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigOverrides};

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config =
            toml::from_str(&Config::default_template()).expect("template should parse");
        let defaults = Config::default();
        assert_eq!(parsed.server.port, defaults.server.port);
        assert_eq!(parsed.storage.db_path, defaults.storage.db_path);
        assert_eq!(parsed.search.endpoint, defaults.search.endpoint);
        assert_eq!(parsed.search.duration, 1);
        assert_eq!(defaults.search.duration, 1);
        assert!(parsed.topics.seed.is_empty());
        assert!(Config::default_template().contains(r#"# seed = ["哈基米音乐", "OI"]"#));
    }

    #[test]
    fn partial_file_keeps_field_defaults() {
        let parsed: Config = toml::from_str(
            r#"
[search]
cookie = "buvid3=abc"

[topics]
seed = ["demo", "OI"]
"#,
        )
        .expect("partial config should parse");
        assert_eq!(parsed.search.cookie, "buvid3=abc");
        assert_eq!(parsed.search.timeout_secs, 15);
        assert_eq!(parsed.search.duration, 1);
        assert_eq!(parsed.server.host, "127.0.0.1");
        assert_eq!(parsed.topics.seed, vec!["demo".to_string(), "OI".to_string()]);
    }

    #[test]
    fn overrides_replace_only_given_fields() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/topics.db".to_string()),
            host: None,
            port: Some(8080),
        });
        assert_eq!(config.storage.db_path, "/tmp/topics.db");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
    }
}
