//! Service configuration loaded from a TOML file.
//!
//! Every section is optional; missing sections fall back to defaults.
//! String values support `${ENV_VAR}` interpolation so secrets can stay
//! out of the file:
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:8000"
//!
//! [store]
//! path = "/var/lib/ballot/ballot.db"
//!
//! [chain]
//! rpc_url = "${INFURA_URL}"
//! contract = "0x408ED6354d4973f66138C91495F2f2FCbd8724C3"
//!
//! [insight]
//! api_key = "${ANTHROPIC_API_KEY}"
//! model = "claude-3-haiku-20240307"
//! timeout_seconds = 20
//! ```

use std::path::PathBuf;
use std::{env, fmt};

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_LISTEN: &str = "0.0.0.0:8000";
pub const DEFAULT_MODEL: &str = "claude-3-haiku-20240307";
pub const DEFAULT_INSIGHT_TIMEOUT_SECS: u64 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Read { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct BallotConfig {
    pub server: Option<ServerConfig>,
    pub store: Option<StoreConfig>,
    pub chain: Option<ChainConfig>,
    pub insight: Option<InsightConfig>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServerConfig {
    /// Bind address, `host:port`.
    pub listen: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite database file.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChainConfig {
    /// JSON-RPC endpoint of an Ethereum node.
    pub rpc_url: Option<String>,
    /// Address of the governance contract.
    pub contract: Option<String>,
}

#[derive(Default, Deserialize)]
pub struct InsightConfig {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

// Manual Debug impl so the API key never reaches logs.
impl fmt::Debug for InsightConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InsightConfig")
            .field(
                "api_key",
                &if self.api_key.is_some() {
                    "[REDACTED]"
                } else {
                    "None"
                },
            )
            .field("model", &self.model)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl BallotConfig {
    /// Load from the default path. A missing file is not an error; it
    /// yields the all-defaults configuration.
    pub fn load() -> Result<Self, ConfigError> {
        match config_path() {
            Some(path) if path.exists() => Self::load_from(path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "failed to read config");
            ConfigError::Read { path: path.clone(), source: err }
        })?;

        toml::from_str(&content).map_err(|err| {
            tracing::warn!(path = %path.display(), error = %err, "failed to parse config");
            ConfigError::Parse { path, source: err }
        })
    }

    #[must_use]
    pub fn listen_addr(&self) -> String {
        self.server
            .as_ref()
            .and_then(|s| s.listen.clone())
            .unwrap_or_else(|| DEFAULT_LISTEN.to_owned())
    }

    /// Database file path; defaults to `ballot.db` under the platform
    /// data directory.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.store
            .as_ref()
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| {
                dirs::data_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("ballot")
                    .join("ballot.db")
            })
    }

    #[must_use]
    pub fn rpc_url(&self) -> Option<String> {
        self.chain
            .as_ref()
            .and_then(|c| c.rpc_url.as_deref())
            .map(expand_env_vars)
    }

    #[must_use]
    pub fn contract(&self) -> Option<String> {
        self.chain
            .as_ref()
            .and_then(|c| c.contract.as_deref())
            .map(expand_env_vars)
    }

    /// API key from the config file (with `${VAR}` expansion), falling
    /// back to the `ANTHROPIC_API_KEY` environment variable.
    #[must_use]
    pub fn insight_api_key(&self) -> Option<String> {
        self.insight
            .as_ref()
            .and_then(|i| i.api_key.as_deref())
            .map(expand_env_vars)
            .filter(|key| !key.is_empty())
            .or_else(|| env::var("ANTHROPIC_API_KEY").ok().filter(|k| !k.is_empty()))
    }

    #[must_use]
    pub fn insight_model(&self) -> String {
        self.insight
            .as_ref()
            .and_then(|i| i.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned())
    }

    #[must_use]
    pub fn insight_timeout_secs(&self) -> u64 {
        self.insight
            .as_ref()
            .and_then(|i| i.timeout_seconds)
            .unwrap_or(DEFAULT_INSIGHT_TIMEOUT_SECS)
    }
}

#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Ok(path) = env::var("BALLOT_CONFIG") {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(".ballot").join("config.toml"))
}

/// Replace `${VAR}` occurrences with the environment variable's value;
/// missing variables expand to the empty string.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut i = 0;

    while i < value.len() {
        if value[i..].starts_with("${") {
            let start = i + 2;
            if let Some(end_rel) = value[start..].find('}') {
                let end = start + end_rel;
                let var = &value[start..end];
                if !var.is_empty() {
                    out.push_str(&env::var(var).unwrap_or_default());
                }
                i = end + 1;
                continue;
            }
        }

        let ch = value[i..].chars().next().unwrap_or('\0');
        out.push(ch);
        i += ch.len_utf8();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: BallotConfig = toml::from_str("").unwrap();
        assert_eq!(config.listen_addr(), DEFAULT_LISTEN);
        assert_eq!(config.insight_model(), DEFAULT_MODEL);
        assert_eq!(config.insight_timeout_secs(), DEFAULT_INSIGHT_TIMEOUT_SECS);
        assert!(config.rpc_url().is_none());
        assert!(config.contract().is_none());
    }

    #[test]
    fn parses_all_sections() {
        let toml_str = r#"
[server]
listen = "127.0.0.1:9000"

[store]
path = "/tmp/test.db"

[chain]
rpc_url = "https://mainnet.example/rpc"
contract = "0x408ED6354d4973f66138C91495F2f2FCbd8724C3"

[insight]
api_key = "sk-ant-test"
model = "claude-3-haiku-20240307"
timeout_seconds = 5
"#;
        let config: BallotConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.listen_addr(), "127.0.0.1:9000");
        assert_eq!(config.db_path(), PathBuf::from("/tmp/test.db"));
        assert_eq!(
            config.rpc_url().as_deref(),
            Some("https://mainnet.example/rpc")
        );
        assert_eq!(
            config.contract().as_deref(),
            Some("0x408ED6354d4973f66138C91495F2f2FCbd8724C3")
        );
        assert_eq!(config.insight_api_key().as_deref(), Some("sk-ant-test"));
        assert_eq!(config.insight_timeout_secs(), 5);
    }

    #[test]
    fn insight_debug_redacts_the_key() {
        let config = InsightConfig {
            api_key: Some("sk-ant-secret123".to_owned()),
            model: None,
            timeout_seconds: None,
        };
        let debug_output = format!("{config:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("sk-ant-secret123"));
    }

    #[test]
    fn expand_replaces_known_vars() {
        unsafe {
            env::set_var("BALLOT_TEST_VAR", "replaced");
        }
        assert_eq!(
            expand_env_vars("pre ${BALLOT_TEST_VAR} post"),
            "pre replaced post"
        );
        unsafe {
            env::remove_var("BALLOT_TEST_VAR");
        }
    }

    #[test]
    fn expand_drops_missing_vars() {
        unsafe {
            env::remove_var("BALLOT_MISSING_VAR");
        }
        assert_eq!(expand_env_vars("a ${BALLOT_MISSING_VAR} b"), "a  b");
    }

    #[test]
    fn expand_preserves_unclosed_brace() {
        assert_eq!(expand_env_vars("test ${UNCLOSED"), "test ${UNCLOSED");
    }

    #[test]
    fn load_from_reports_parse_errors_with_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "invalid toml [").unwrap();

        let err = BallotConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert_eq!(err.path(), &path);
    }

    #[test]
    fn load_from_missing_file_is_a_read_error() {
        let err = BallotConfig::load_from("/nonexistent/config.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
