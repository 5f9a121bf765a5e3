use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

mod command;
mod config;
mod daemon;
mod logging;

use config::Config;
use daemon::Daemon;
use logging::LogFormat;

/// Keep WebSub subscriptions alive and run a command for every notification.
///
/// Every configured topic is subscribed on start and renewed before its
/// lease runs out. Verified notifications are piped to the configured
/// program. Ctrl-C unsubscribes everything and exits.
#[derive(Parser, Debug)]
#[command(name = "push-sub", version, about)]
struct Args {
    /// Configuration file (default: <config dir>/push-sub/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level or filter; PUSH_SUB_LOG takes precedence
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_logging(&args.log_level, args.log_format)?;

    let path = match args.config {
        Some(path) => path,
        None => Config::default_path()?,
    };
    let config = Config::load(&path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    info!(path = %path.display(), subscriptions = config.subscriptions.len(), "loaded configuration");

    let daemon = Daemon::start(&config).await?;
    info!(address = %config.address, "listening");

    daemon.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["push-sub"]).unwrap();
        assert!(args.config.is_none());
        assert_eq!(args.log_level, "info");
        assert_eq!(args.log_format, LogFormat::Compact);

        let args =
            Args::try_parse_from(["push-sub", "-c", "/etc/push-sub.toml", "--log-format", "json"])
                .unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/push-sub.toml")));
        assert_eq!(args.log_format, LogFormat::Json);
    }
}
