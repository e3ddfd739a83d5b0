use std::net::SocketAddr;

use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use nest_exporter::nest::DEFAULT_API_URL;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Parser)]
#[command(version, about = "Prometheus exporter for Nest thermostats")]
pub struct Args {
    /// Address the metrics endpoint listens on
    #[arg(long, env = "NEST_EXPORTER_ADDR", default_value = "0.0.0.0:9264")]
    pub addr: SocketAddr,

    /// Poll interval in seconds
    #[arg(
        long = "poll",
        env = "NEST_EXPORTER_POLL_SECS",
        default_value_t = 120,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_secs: u64,

    /// Nest API access token
    #[arg(
        long,
        env = "NEST_TOKEN",
        hide_env_values = true,
        value_parser = NonEmptyStringValueParser::new()
    )]
    pub token: String,

    #[arg(long, env = "NEST_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Request timeout in seconds
    #[arg(
        long = "timeout",
        env = "NEST_EXPORTER_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_secs: u64,

    /// Drop series of structures and thermostats that disappear from the API
    #[arg(long, env = "NEST_EXPORTER_EVICT_STALE")]
    pub evict_stale: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["nest-exporter", "--token", "c.abc"]).unwrap();

        assert_eq!(args.addr, "0.0.0.0:9264".parse::<SocketAddr>().unwrap());
        assert_eq!(args.poll_secs, 120);
        assert_eq!(args.timeout_secs, 30);
        assert_eq!(args.api_url, DEFAULT_API_URL);
        assert!(!args.evict_stale);
        assert_eq!(args.log_level, LevelFilter::INFO);
    }

    #[test]
    fn log_level_is_validated() {
        let args =
            Args::try_parse_from(["nest-exporter", "--token", "c.abc", "--log-level", "debug"])
                .unwrap();
        assert_eq!(args.log_level, LevelFilter::DEBUG);

        let args = ["nest-exporter", "--token", "c.abc", "--log-level", "loud"];
        assert!(Args::try_parse_from(args).is_err());
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(Args::try_parse_from(["nest-exporter", "--token", ""]).is_err());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let args = ["nest-exporter", "--token", "c.abc", "--poll", "0"];
        assert!(Args::try_parse_from(args).is_err());
    }
}
