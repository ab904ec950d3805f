//! Service settings
//!
//! Read from `POPTIMIZER__*` environment variables, `__` separating nested
//! keys: `POPTIMIZER__SERVER__ADDR`, `POPTIMIZER__RULES__TIMEOUT` and so on.
//! Every key has a default.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use config::{Config, Environment};
use market_data::Sources;
use serde::Deserialize;
use serde_with::{serde_as, DurationSeconds};

pub const ENV_PREFIX: &str = "POPTIMIZER";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub db: DbSettings,
    pub http: HttpSettings,
    pub rules: RuleSettings,
    pub telegram: Option<TelegramSettings>,
    pub sources: Sources,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 10000)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbSettings {
    pub name: String,
    pub dump_dir: PathBuf,
    /// Dumps kept per collection.
    pub keep_dumps: usize,
}

impl Default for DbSettings {
    fn default() -> Self {
        Self {
            name: "data".to_string(),
            dump_dir: PathBuf::from("dump"),
            keep_dumps: 3,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleSettings {
    /// Deadline of the work triggered by one event.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub timeout: Duration,
    #[serde_as(as = "DurationSeconds<u64>")]
    pub backup_timeout: Duration,
    /// Day timer period.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub tick: Duration,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            backup_timeout: Duration::from_secs(30),
            tick: Duration::from_secs(60),
        }
    }
}

/// Error notifications are sent only when both values are set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TelegramSettings {
    pub token: String,
    pub chat_id: String,
}

impl Settings {
    pub fn build() -> anyhow::Result<Self> {
        Self::from_env(environment())
    }

    fn from_env(env: Environment) -> anyhow::Result<Self> {
        let settings = Config::builder().add_source(env).build()?.try_deserialize()?;
        Ok(settings)
    }

    /// Directory with the dumps of this database.
    pub fn dump_path(&self) -> PathBuf {
        self.db.dump_dir.join(&self.db.name)
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> Settings {
        let source: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Settings::from_env(environment().source(Some(source))).unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = from_vars(&[]);

        assert_eq!(settings, Settings::default());
        assert_eq!(settings.server.addr.port(), 10000);
        assert_eq!(settings.rules.timeout, Duration::from_secs(60));
        assert_eq!(settings.telegram, None);
        assert_eq!(settings.dump_path(), PathBuf::from("dump").join("data"));
    }

    #[test]
    fn test_nested_overrides() {
        let settings = from_vars(&[
            ("POPTIMIZER__SERVER__ADDR", "127.0.0.1:8080"),
            ("POPTIMIZER__DB__NAME", "test"),
            ("POPTIMIZER__DB__KEEP_DUMPS", "5"),
            ("POPTIMIZER__RULES__TICK", "5"),
            ("POPTIMIZER__HTTP__REQUEST_TIMEOUT", "10"),
            ("POPTIMIZER__TELEGRAM__TOKEN", "secret"),
            ("POPTIMIZER__TELEGRAM__CHAT_ID", "42"),
            ("POPTIMIZER__SOURCES__ISS", "http://localhost:9000"),
        ]);

        assert_eq!(settings.server.addr, SocketAddr::from(([127, 0, 0, 1], 8080)));
        assert_eq!(settings.db.keep_dumps, 5);
        assert_eq!(settings.rules.tick, Duration::from_secs(5));
        assert_eq!(settings.rules.timeout, Duration::from_secs(60));
        assert_eq!(settings.http.request_timeout, Duration::from_secs(10));
        assert_eq!(
            settings.telegram,
            Some(TelegramSettings {
                token: "secret".to_string(),
                chat_id: "42".to_string(),
            })
        );
        assert_eq!(settings.sources.iss, "http://localhost:9000");
        assert_eq!(settings.sources.nasdaq, Sources::default().nasdaq);
        assert_eq!(settings.dump_path(), PathBuf::from("dump").join("test"));
    }
}
