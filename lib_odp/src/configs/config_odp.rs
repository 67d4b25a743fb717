//! # ODP Configuration
//!
//! Loads the relay configuration from a JSON file or from the content of an
//! environment variable, then validates it into an immutable [`OdpConfig`].
//!
//! Expected shape:
//! ```json
//! {
//!     "api_key": "o.xxxxxxxx",
//!     "odp_device_name": "ODP",
//!     "authorised_src_idens": ["ujpah72o0sjAoRtnM0jc"],
//!     "commands": {
//!         "reboot": "shutdown -r now",
//!         "web-up": "docker-start:web1"
//!     }
//! }
//! ```

use std::collections::HashSet;
use std::path::PathBuf;
use std::{env, fmt, fs};

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use thiserror::Error;

use crate::relay::registry::{ActionSpecError, CommandRegistry};

/// Device nickname used when the config does not name one.
pub const DEFAULT_DEVICE_NAME: &str = "ODP";
/// Config file read when no path is given.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/odp.json";
/// Environment variable holding the whole JSON config in `--envconfig` mode.
pub const CONFIG_ENV_VAR: &str = "ODP_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable {0} is not present")]
    MissingEnvVar(String),

    #[error("Environment variable error: {0}")]
    VarError(#[from] env::VarError),

    #[error("Config is not valid JSON for ODP: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config field 'api_key' is empty")]
    MissingApiKey,

    #[error("Command '{name}' has an invalid action spec: {source}")]
    InvalidCommand {
        name: String,
        #[source]
        source: ActionSpecError,
    },
}

/// Where the JSON config comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    Env(String),
}

impl Default for ConfigSource {
    fn default() -> Self {
        ConfigSource::File(PathBuf::from(DEFAULT_CONFIG_PATH))
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::File(path) => write!(f, "file {}", path.display()),
            ConfigSource::Env(var) => write!(f, "${}", var),
        }
    }
}

/// On-disk layout, before validation.
#[derive(Deserialize)]
struct RawConfig {
    api_key: String,
    #[serde(default = "default_device_name")]
    odp_device_name: String,
    authorised_src_idens: Vec<String>,
    #[serde(deserialize_with = "deserialize_unique_commands")]
    commands: Vec<(String, String)>,
}

fn default_device_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

// serde_json keeps the last value of a repeated key; a repeated command name
// is almost always a copy/paste mistake, so refuse it.
fn deserialize_unique_commands<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct UniqueCommands;

    impl<'de> Visitor<'de> for UniqueCommands {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of command name to action spec string")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut seen = HashSet::new();
            let mut commands = Vec::new();
            while let Some((name, spec)) = map.next_entry::<String, String>()? {
                if !seen.insert(name.clone()) {
                    return Err(de::Error::custom(format!("duplicate command '{}'", name)));
                }
                commands.push((name, spec));
            }
            Ok(commands)
        }
    }

    deserializer.deserialize_map(UniqueCommands)
}

/// Validated, immutable relay configuration.
#[derive(Clone)]
pub struct OdpConfig {
    pub api_key: String,
    pub device_name: String,
    pub authorised_src_idens: HashSet<String>,
    pub commands: CommandRegistry,
}

impl OdpConfig {
    /// Reads and validates the config from `source`.
    pub fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        let text = match source {
            ConfigSource::File(path) => fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?,
            ConfigSource::Env(var) => match env::var(var) {
                Ok(text) => text,
                Err(env::VarError::NotPresent) => return Err(ConfigError::MissingEnvVar(var.clone())),
                Err(e) => return Err(ConfigError::VarError(e)),
            },
        };

        let config = Self::from_json_str(&text)?;
        log::debug!("Loaded config from {}: {:?}", source, config);
        Ok(config)
    }

    /// Parses and validates a JSON document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = serde_json::from_str(text)?;

        let api_key = raw.api_key.trim().to_string();
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }

        let device_name = match raw.odp_device_name.trim() {
            "" => default_device_name(),
            name => name.to_string(),
        };

        let commands = CommandRegistry::parse(raw.commands)
            .map_err(|(name, source)| ConfigError::InvalidCommand { name, source })?;

        if commands.is_empty() {
            log::warn!("Config defines no commands; every push will be answered as a failure.");
        }
        if raw.authorised_src_idens.is_empty() {
            log::warn!("Config authorises no source devices; all pushes will be ignored.");
        }

        Ok(Self {
            api_key,
            device_name,
            authorised_src_idens: raw.authorised_src_idens.into_iter().collect(),
            commands,
        })
    }
}

// Keep the access token out of debug logs.
impl fmt::Debug for OdpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OdpConfig")
            .field("api_key", &mask_secret(&self.api_key))
            .field("device_name", &self.device_name)
            .field("authorised_src_idens", &self.authorised_src_idens)
            .field("commands", &self.commands.names())
            .finish()
    }
}

/// Shows the first four characters of a secret and masks the rest.
pub fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    if secret.chars().count() <= 4 {
        "*****".to_string()
    } else {
        format!("{}*****", visible)
    }
}
