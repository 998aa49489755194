//! mini-service - sample service built on servicekit
//!
//! To install the service:
//!   mini-service install [LocalService|NetworkService|LocalSystem|DOMAIN\user password]
//!
//! To start or stop it:
//!   mini-service start
//!   mini-service stop
//!
//! To run it in the console:
//!   mini-service run

use anyhow::Result;
use clap::Parser;
use std::time::Duration;
use tracing::{error, info};

use servicekit::config::{Args, HostConfig};
use servicekit::lifecycle::{CancellationToken, Cancelled};
use servicekit::recovery::{RecoveryAction, RecoveryPolicy};
use servicekit::settings::{ServiceSettings, StartMode};
use servicekit::ServiceHost;

const SERVICE_NAME: &str = "MiniService";

fn main() -> Result<()> {
    let args = Args::parse();

    let config = HostConfig::load_default(SERVICE_NAME).unwrap_or_else(|e| {
        eprintln!("Failed to load config, using defaults: {}", e);
        HostConfig::default()
    });

    let host = ServiceHost::new(settings(), work).with_config(config);
    if let Some(outcome) = host.run(&args)? {
        println!("{}", outcome);
    }
    Ok(())
}

fn settings() -> ServiceSettings {
    ServiceSettings {
        display_name: "Minimal Service".into(),
        description: "Minimal service description".into(),
        start_mode: StartMode::Automatic,
        recovery: RecoveryPolicy {
            first_failure: RecoveryAction::RestartService,
            second_failure: RecoveryAction::RestartService,
            subsequent_failure: RecoveryAction::RestartHost,
            reset_window_days: 1,
            restart_wait_minutes: 3,
            ..RecoveryPolicy::default()
        },
        ..ServiceSettings::new(SERVICE_NAME)
    }
}

/// Periodic work loop; a failed iteration backs off instead of ending the service
fn work(token: &CancellationToken) -> Result<()> {
    loop {
        if token.wait(Duration::from_secs(5)) {
            return Err(Cancelled.into());
        }

        match tick() {
            Ok(()) => {}
            Err(e) if e.is::<Cancelled>() => return Err(e),
            Err(e) => {
                error!("Work iteration failed: {:#}", e);
                token.sleep(Duration::from_secs(30))?;
            }
        }
    }
}

fn tick() -> Result<()> {
    info!("{} is alive", SERVICE_NAME);
    Ok(())
}
