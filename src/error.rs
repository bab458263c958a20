use thiserror::Error;

/// Errors raised by the Ephemeris Oracle (spec.md §4.1, §7).
#[derive(Debug, Error)]
pub enum EphemerisError {
    #[error("invalid TLE: {0}")]
    BadTLE(#[from] sgp4::TleError),
    #[error("invalid orbital elements: {0}")]
    BadElements(#[from] sgp4::ElementsError),
    #[error("propagation error: {0}")]
    Propagation(#[from] sgp4::Error),
}

/// Errors raised by the Capture Engine (spec.md §4.3, §7).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error(
        "insufficient storage: used {used_gb:.2} GB + projected {projected_gb:.2} GB exceeds cap {cap_gb:.2} GB"
    )]
    InsufficientSpace {
        used_gb: f64,
        projected_gb: f64,
        cap_gb: f64,
    },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by the rotator driver (spec.md §4.4, §6, §7).
#[derive(Debug, Error)]
pub enum RotatorError {
    #[error("target out of reach: az={az} el={el}")]
    OutOfReach { az: f64, el: f64 },
    #[error("serial timeout")]
    SerialTimeout,
    #[error("serial i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serial: {0}")]
    Serial(#[from] serialport::Error),
    #[error("rotator error: {0}")]
    Device(String),
}

/// Errors raised by the Control Server (spec.md §4.5, §6, §7).
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("protocol framing error: {0}")]
    ProtocolFraming(String),
    #[error("transport closed")]
    TransportClosed,
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
