use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser};
use lib_odp::configs::config_odp::{CONFIG_ENV_VAR, DEFAULT_CONFIG_PATH};
use lib_odp::ConfigSource;

/// Flags shared by both relays.
#[derive(Args, Debug, Clone)]
pub struct CommonArgs {
    #[clap(short, long, env = "ODP_DEBUG", help = "Enable debug logging.")]
    pub debug: bool,

    #[clap(
        short,
        long,
        env = "ODP_CONFIG_PATH",
        default_value = DEFAULT_CONFIG_PATH,
        help = "Path to the JSON configuration file."
    )]
    pub config: PathBuf,

    #[clap(
        short,
        long,
        env = "ODP_ENVCONFIG",
        help = "Read the configuration JSON from the ODP_CONFIG environment variable instead of a file."
    )]
    pub envconfig: bool,

    #[clap(short, long, help = "Print every device on the account and exit.")]
    pub show_devices: bool,

    #[clap(long, env = "ODP_LOG_DIR", help = "Also write logs to a file in this directory.")]
    pub log_dir: Option<PathBuf>,
}

impl CommonArgs {
    pub fn config_source(&self) -> ConfigSource {
        if self.envconfig {
            ConfigSource::Env(CONFIG_ENV_VAR.to_string())
        } else {
            ConfigSource::File(self.config.clone())
        }
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(about = "Orbital Defence Platform: polling Pushbullet command relay", version)]
pub struct PollArgs {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[clap(
        short = 't',
        long,
        env = "ODP_POLL_INTERVAL",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds between push list refreshes."
    )]
    pub poll_interval: u64,
}

impl PollArgs {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}

#[derive(Parser, Debug, Clone)]
#[clap(about = "Orbital Defence Platform: realtime Pushbullet command relay", version)]
pub struct StreamArgs {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[clap(
        long,
        env = "ODP_SILENCE_TIMEOUT",
        default_value_t = 90,
        value_parser = clap::value_parser!(u64).range(1..),
        help = "Seconds without any stream message before the connection is considered lost."
    )]
    pub silence_timeout: u64,
}

impl StreamArgs {
    pub fn silence(&self) -> Duration {
        Duration::from_secs(self.silence_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_defaults() {
        let args = PollArgs::try_parse_from(["odp"]).unwrap();
        assert_eq!(args.poll_interval, 30);
        assert!(!args.common.debug);
        assert!(matches!(
            args.common.config_source(),
            ConfigSource::File(ref p) if p == &PathBuf::from(DEFAULT_CONFIG_PATH)
        ));
    }

    #[test]
    fn test_short_flags() {
        let args = PollArgs::try_parse_from(["odp", "-d", "-s", "-t", "5", "-c", "/tmp/odp.json"]).unwrap();
        assert!(args.common.debug);
        assert!(args.common.show_devices);
        assert_eq!(args.interval(), Duration::from_secs(5));
        assert_eq!(args.common.config, PathBuf::from("/tmp/odp.json"));
    }

    #[test]
    fn test_envconfig_switches_source() {
        let args = StreamArgs::try_parse_from(["odp_stream", "-e"]).unwrap();
        assert!(matches!(args.common.config_source(), ConfigSource::Env(ref v) if v == CONFIG_ENV_VAR));
        assert_eq!(args.silence(), Duration::from_secs(90));
    }

    #[test]
    fn test_zero_interval_rejected() {
        assert!(PollArgs::try_parse_from(["odp", "-t", "0"]).is_err());
    }

    #[test]
    fn test_poll_interval_is_polling_only() {
        assert!(StreamArgs::try_parse_from(["odp_stream", "-t", "5"]).is_err());
    }
}
