use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use relay_client::config::{EndpointConfig, SdkConfig, SimulatedConfig, CONFIG_EXIT_CODE};
use relay_client::{ClientConfig, Lifecycle};
use relay_engine::logging::{init_logging, LoggingConfig};

/// Renders the streams announced by a render-broadcast endpoint and sends the
/// frames back.
#[derive(Debug, Parser)]
#[command(name = "relay-tester", version, about)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Broadcast library to load (overrides the config and RELAY_SDK_PATH).
    #[arg(long, value_name = "PATH", conflicts_with = "simulate")]
    library: Option<PathBuf>,

    /// Use the in-process simulated endpoint instead of the broadcast library.
    #[arg(long)]
    simulate: bool,

    /// Log filter in env_logger syntax, e.g. `debug` or `relay_client=trace`.
    #[arg(long, value_name = "FILTER")]
    log: Option<String>,

    /// End the session as soon as any stream window closes.
    #[arg(long)]
    exit_on_any_close: bool,
}

impl Args {
    /// Loads the config file (if any) and applies the command line on top.
    fn into_config(self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::load_from_file(path)
                .with_context(|| format!("failed to load config {}", path.display()))?,
            None => ClientConfig::default(),
        };

        if self.simulate && !matches!(config.endpoint, EndpointConfig::Simulated(_)) {
            config.endpoint = EndpointConfig::Simulated(SimulatedConfig::default());
        }

        if let Some(library) = self.library {
            match &mut config.endpoint {
                EndpointConfig::Sdk(sdk) => sdk.library = Some(library),
                EndpointConfig::Simulated(_) => {
                    config.endpoint = EndpointConfig::Sdk(SdkConfig {
                        library: Some(library),
                        ..SdkConfig::default()
                    });
                }
            }
        }

        if self.log.is_some() {
            config.logging.filter = self.log;
        }

        if self.exit_on_any_close {
            config.exchange.lifecycle = Lifecycle::ExitOnAnyClose;
        }

        Ok(config)
    }
}

/// Builds the session config, or the exit code to stop with.
fn configure(args: Args) -> std::result::Result<ClientConfig, ExitCode> {
    let early_filter = args.log.clone();
    args.into_config().map_err(|err| {
        init_logging(LoggingConfig {
            env_filter: early_filter,
            ..Default::default()
        });
        log::error!("{err:#}");
        ExitCode::from(CONFIG_EXIT_CODE)
    })
}

fn main() -> ExitCode {
    let config = match configure(Args::parse()) {
        Ok(config) => config,
        Err(code) => return code,
    };

    init_logging(LoggingConfig {
        env_filter: config.logging.filter.clone(),
        ..Default::default()
    });

    let exit = relay_client::run(&config);
    ExitCode::from(exit.code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("relay-tester").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn no_arguments_use_the_sdk() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config.endpoint, EndpointConfig::Sdk(SdkConfig::default()));
        assert_eq!(config.exchange.lifecycle, Lifecycle::Independent);
    }

    #[test]
    fn simulate_switches_the_endpoint() {
        let config = parse(&["--simulate", "--exit-on-any-close", "--log", "debug"])
            .into_config()
            .unwrap();
        assert!(matches!(config.endpoint, EndpointConfig::Simulated(_)));
        assert_eq!(config.exchange.lifecycle, Lifecycle::ExitOnAnyClose);
        assert_eq!(config.logging.filter.as_deref(), Some("debug"));
    }

    #[test]
    fn library_overrides_the_sdk_path() {
        let config = parse(&["--library", "/opt/sdk/librelay_broadcast.so"])
            .into_config()
            .unwrap();
        let EndpointConfig::Sdk(sdk) = config.endpoint else {
            panic!("expected sdk endpoint");
        };
        assert_eq!(sdk.library, Some(PathBuf::from("/opt/sdk/librelay_broadcast.so")));
    }

    #[test]
    fn config_failure_exits_outside_the_session_codes() {
        let code = configure(parse(&["--config", "/nonexistent/relay.toml"])).unwrap_err();
        assert_eq!(code, ExitCode::from(CONFIG_EXIT_CODE));
        assert_ne!(code, ExitCode::FAILURE);
    }

    #[test]
    fn library_and_simulate_conflict() {
        let result = Args::try_parse_from(["relay-tester", "--simulate", "--library", "x.so"]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = parse(&["--config", "/nonexistent/relay.toml"])
            .into_config()
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/relay.toml"));
    }
}
