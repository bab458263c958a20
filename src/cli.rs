//! Command line, built the way the teacher builds `cli.rs`: a chained
//! `Command::new(...).arg(...)` definition plus typed accessor methods.

use std::path::PathBuf;

use clap::{Arg, ArgMatches, ColorChoice, Command};

pub struct Cli {
    matches: ArgMatches,
}

impl Cli {
    pub fn new() -> Self {
        let matches = Command::new("groundctl")
            .author("Guillaume W. Bres, <guillaume.bressaix@gmail.com>")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Autonomous satellite ground-station controller: scheduling, rotator tracking and SDR capture")
            .color(ColorChoice::Always)
            .next_help_heading("Rotator")
            .arg(
                Arg::new("rotator-port")
                    .long("rotator-port")
                    .value_name("PORT")
                    .help("Serial port of the azimuth/elevation rotator, e.g. /dev/ttyUSB0"),
            )
            .arg(
                Arg::new("rotator-baud")
                    .long("rotator-baud")
                    .value_name("BAUD")
                    .help("Rotator serial baud rate. Defaults to 9600"),
            )
            .next_help_heading("Control channel")
            .arg(
                Arg::new("listen")
                    .short('l')
                    .long("listen")
                    .value_name("ADDR")
                    .help("Control server bind address. Defaults to 0.0.0.0:22325"),
            )
            .next_help_heading("Capture")
            .arg(
                Arg::new("output-dir")
                    .short('o')
                    .long("output-dir")
                    .value_name("DIR")
                    .help("Directory captured I/Q files are written to. Defaults to the current directory"),
            )
            .arg(
                Arg::new("storage-cap-gb")
                    .long("storage-cap-gb")
                    .value_name("GB")
                    .help("Admission-control storage budget, in GB. Defaults to 120"),
            )
            .arg(
                Arg::new("default-freq-hz")
                    .long("default-freq-hz")
                    .value_name("HZ")
                    .help("Default center frequency used when a queued satellite carries none of its own"),
            )
            .next_help_heading("Observer")
            .arg(
                Arg::new("lat")
                    .long("lat")
                    .value_name("DEG")
                    .required(true)
                    .help("Observer latitude, decimal degrees"),
            )
            .arg(
                Arg::new("lon")
                    .long("lon")
                    .value_name("DEG")
                    .required(true)
                    .help("Observer longitude, decimal degrees"),
            )
            .arg(
                Arg::new("elevation-m")
                    .long("elevation-m")
                    .value_name("M")
                    .help("Observer elevation above sea level, meters. Defaults to 0"),
            )
            .get_matches();

        Self { matches }
    }

    pub fn rotator_port(&self) -> Option<&str> {
        self.matches.get_one::<String>("rotator-port").map(String::as_str)
    }

    pub fn rotator_baud(&self) -> u32 {
        self.matches
            .get_one::<String>("rotator-baud")
            .and_then(|s| s.parse().ok())
            .unwrap_or(9600)
    }

    pub fn listen_addr(&self) -> String {
        self.matches
            .get_one::<String>("listen")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:22325".to_string())
    }

    pub fn output_dir(&self) -> PathBuf {
        self.matches
            .get_one::<String>("output-dir")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn storage_cap_gb(&self) -> f64 {
        self.matches
            .get_one::<String>("storage-cap-gb")
            .and_then(|s| s.parse().ok())
            .unwrap_or(120.0)
    }

    pub fn default_freq_hz(&self) -> u64 {
        self.matches
            .get_one::<String>("default-freq-hz")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1_626_000_000)
    }

    pub fn latitude(&self) -> f64 {
        self.matches
            .get_one::<String>("lat")
            .unwrap()
            .parse()
            .unwrap_or_else(|e| panic!("invalid --lat: {e}"))
    }

    pub fn longitude(&self) -> f64 {
        self.matches
            .get_one::<String>("lon")
            .unwrap()
            .parse()
            .unwrap_or_else(|e| panic!("invalid --lon: {e}"))
    }

    pub fn elevation_m(&self) -> f64 {
        self.matches
            .get_one::<String>("elevation-m")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.0)
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
