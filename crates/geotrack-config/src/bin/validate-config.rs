//! Config validation CLI tool
//!
//! Validates a geotrackd configuration file and reports any errors.

use geotrack_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a geotrackd configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match geotrack_config::load_config(&config_path) {
        Ok(settings) => {
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", geotrack_config::CURRENT_CONFIG_VERSION);
            println!("  Socket: {}", settings.daemon.socket_path.display());
            println!("  Data dir: {}", settings.daemon.data_dir.display());
            println!(
                "  Interval: {}s, auto-restart delay: {}s",
                settings.tracking.interval_seconds, settings.tracking.auto_restart_delay_seconds
            );
            match &settings.default_member {
                Some(member) if settings.tracking.auto_start_enabled => {
                    println!("  Auto-start: {}", member);
                }
                _ => println!("  Auto-start: off"),
            }

            println!();
            println!("Sources:");
            if settings.gpsd.enabled {
                println!("  - primary: gpsd at {}:{}", settings.gpsd.host, settings.gpsd.port);
            }
            if let Some(url) = settings.network.url.as_ref().filter(|_| settings.network.enabled) {
                println!(
                    "  - secondary: {} every {}s",
                    url,
                    settings.network.poll_interval.as_secs()
                );
            }
            if settings.geocode.enabled {
                println!("Geocoder: {}", settings.geocode.url);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                geotrack_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                geotrack_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                geotrack_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                geotrack_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        geotrack_config::CURRENT_CONFIG_VERSION
                    );
                }
                other => eprintln!("{}", other),
            }
            ExitCode::from(1)
        }
    }
}
