//! # Command Registry
//!
//! Maps the command names a sender may type to the action that runs on this
//! host. Action specs are parsed once, when the configuration is loaded, so a
//! malformed entry stops the process at startup instead of failing on the
//! first push that names it.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Prefix that turns an action spec into a container start.
pub const CONTAINER_START_PREFIX: &str = "docker-start:";
/// Prefix that turns an action spec into a container stop.
pub const CONTAINER_STOP_PREFIX: &str = "docker-stop:";

/// Reasons an action spec string is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionSpecError {
    #[error("action spec is empty")]
    Empty,

    #[error("'{prefix}' needs a container id or name after the colon")]
    MissingContainerId { prefix: &'static str },

    #[error("'{0}' is not a valid container id or name")]
    InvalidContainerId(String),
}

/// A parsed action spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionSpec {
    /// Program and arguments, executed directly without a shell.
    Shell(Vec<String>),
    /// Start the named container.
    ContainerStart(String),
    /// Stop the named container.
    ContainerStop(String),
}

impl FromStr for ActionSpec {
    type Err = ActionSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        if let Some(id) = spec.strip_prefix(CONTAINER_START_PREFIX) {
            return parse_container_id(CONTAINER_START_PREFIX, id).map(ActionSpec::ContainerStart);
        }
        if let Some(id) = spec.strip_prefix(CONTAINER_STOP_PREFIX) {
            return parse_container_id(CONTAINER_STOP_PREFIX, id).map(ActionSpec::ContainerStop);
        }

        let argv: Vec<String> = spec.split_whitespace().map(str::to_string).collect();
        if argv.is_empty() {
            return Err(ActionSpecError::Empty);
        }
        Ok(ActionSpec::Shell(argv))
    }
}

// Docker accepts `[a-zA-Z0-9][a-zA-Z0-9_.-]*` for names and hex for ids.
fn parse_container_id(prefix: &'static str, raw: &str) -> Result<String, ActionSpecError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ActionSpecError::MissingContainerId { prefix });
    }

    let mut chars = id.chars();
    let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !(first_ok && rest_ok) {
        return Err(ActionSpecError::InvalidContainerId(id.to_string()));
    }
    Ok(id.to_string())
}

impl fmt::Display for ActionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionSpec::Shell(argv) => write!(f, "{}", argv.join(" ")),
            ActionSpec::ContainerStart(id) => write!(f, "{}{}", CONTAINER_START_PREFIX, id),
            ActionSpec::ContainerStop(id) => write!(f, "{}{}", CONTAINER_STOP_PREFIX, id),
        }
    }
}

/// Read-only lookup table from command name to action.
#[derive(Debug, Clone, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, ActionSpec>,
}

impl CommandRegistry {
    /// Parses every raw spec, failing on the first malformed one.
    pub fn parse<I, K, V>(raw: I) -> Result<Self, (String, ActionSpecError)>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let mut commands = HashMap::new();
        for (name, spec) in raw {
            let name = name.into();
            match spec.as_ref().parse::<ActionSpec>() {
                Ok(action) => {
                    commands.insert(name, action);
                }
                Err(e) => return Err((name, e)),
            }
        }
        Ok(Self { commands })
    }

    /// Looks up a command by the name a sender typed. Surrounding whitespace
    /// (phones like to append a newline) is ignored.
    pub fn lookup(&self, name: &str) -> Option<&ActionSpec> {
        self.commands.get(name.trim())
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command names in sorted order, for logging.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_spec_splits_on_whitespace() {
        let spec: ActionSpec = "shutdown  -r\tnow".parse().unwrap();
        assert_eq!(
            spec,
            ActionSpec::Shell(vec!["shutdown".into(), "-r".into(), "now".into()])
        );
    }

    #[test]
    fn test_shell_metacharacters_are_kept_literal() {
        let spec: ActionSpec = "echo $HOME; rm -rf /".parse().unwrap();
        assert_eq!(
            spec,
            ActionSpec::Shell(vec![
                "echo".into(),
                "$HOME;".into(),
                "rm".into(),
                "-rf".into(),
                "/".into()
            ])
        );
    }

    #[test]
    fn test_container_prefixes() {
        assert_eq!(
            "docker-start:web1".parse::<ActionSpec>().unwrap(),
            ActionSpec::ContainerStart("web1".into())
        );
        assert_eq!(
            "docker-stop:db_main.1".parse::<ActionSpec>().unwrap(),
            ActionSpec::ContainerStop("db_main.1".into())
        );
    }

    #[test]
    fn test_malformed_specs_are_rejected() {
        assert_eq!("".parse::<ActionSpec>(), Err(ActionSpecError::Empty));
        assert_eq!("   ".parse::<ActionSpec>(), Err(ActionSpecError::Empty));
        assert_eq!(
            "docker-start:".parse::<ActionSpec>(),
            Err(ActionSpecError::MissingContainerId { prefix: CONTAINER_START_PREFIX })
        );
        assert_eq!(
            "docker-stop:../etc".parse::<ActionSpec>(),
            Err(ActionSpecError::InvalidContainerId("../etc".into()))
        );
    }

    #[test]
    fn test_display_round_trips_the_prefix() {
        let spec = ActionSpec::ContainerStop("web1".into());
        assert_eq!(spec.to_string(), "docker-stop:web1");
    }

    #[test]
    fn test_registry_lookup_trims_the_name() {
        let registry = CommandRegistry::parse([("reboot", "shutdown -r now")]).unwrap();
        assert!(registry.lookup("reboot\n").is_some());
        assert!(registry.lookup("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["reboot"]);
    }

    #[test]
    fn test_registry_parse_names_the_bad_command() {
        let err = CommandRegistry::parse([("ok", "true"), ("bad", "docker-start:")]).unwrap_err();
        assert_eq!(err.0, "bad");
    }
}
