//! groundctl: autonomous satellite ground-station controller. Wires the
//! Ephemeris Oracle, Schedule Builder, Tracker, Capture Engine and Control
//! Server together (spec.md §1/§5).

use std::sync::Arc;

use env_logger::{Builder, Target};
use log::{info, warn};
use tokio::sync::Mutex as AsyncMutex;

use groundctl::capture::device::{NullSdr, Sdr};
use groundctl::cli::Cli;
use groundctl::config::Config;
use groundctl::control::{CommandContext, ControlServer};
use groundctl::observer::Observer;
use groundctl::rotator::{NullRotator, Rotator, SerialRotator};
use groundctl::tracker::{Tracker, TrackerState};

#[tokio::main]
async fn main() {
    Builder::from_default_env()
        .target(Target::Stdout)
        .format_timestamp_secs()
        .format_module_path(false)
        .init();

    let cli = Cli::new();
    let config = Config::from(&cli);
    let observer = Observer::new(config.latitude_deg, config.longitude_deg, config.elevation_m);

    let state = Arc::new(AsyncMutex::new(TrackerState::new(
        observer,
        config.output_dir.clone(),
        config.storage_cap_gb,
        config.default_freq_hz,
    )));

    let rotator: Arc<std::sync::Mutex<Box<dyn Rotator>>> = match &config.rotator_port {
        Some(port) => match SerialRotator::open(port, config.rotator_baud) {
            Ok(r) => Arc::new(std::sync::Mutex::new(Box::new(r))),
            Err(e) => {
                warn!("failed to open rotator on {port}: {e}; pointing commands will be logged only");
                Arc::new(std::sync::Mutex::new(Box::new(NullRotator::default())))
            }
        },
        None => {
            warn!("no --rotator-port given; pointing commands will be logged only");
            Arc::new(std::sync::Mutex::new(Box::new(NullRotator::default())))
        }
    };

    let sdr: Arc<std::sync::Mutex<Box<dyn Sdr>>> = Arc::new(std::sync::Mutex::new(Box::new(NullSdr::default())));

    let tracker = Arc::new(AsyncMutex::new(Tracker::new(state.clone(), sdr.clone(), rotator.clone())));
    let ctx = CommandContext {
        state,
        tracker,
        rotator,
        sdr,
    };

    let listen_addr = config.listen_addr.clone();
    let mut server = ControlServer::bind(&listen_addr, ctx)
        .await
        .unwrap_or_else(|e| panic!("failed to bind control server on {listen_addr}: {e}"));

    info!("groundctl listening on {listen_addr}");
    server.run().await;
}
