//! Control Server (spec.md §4.5/§6): a single length-prefixed TCP protocol,
//! one connection handled at a time, dispatching the command table defined
//! in `command.rs`.

pub mod command;
pub mod metadata;

use std::sync::Arc;

use log::{error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;

use crate::capture::device::Sdr;
use crate::error::ControlError;
use crate::rotator::Rotator;
use crate::tracker::{Tracker, TrackerState};

/// Longest the ASCII-decimal length field is allowed to run before the
/// payload must begin (spec.md §4.5: "up to 10 chars").
const MAX_LEN_DIGITS: usize = 10;

/// Writes the variable-width decimal length (no padding, no delimiter) the
/// reader expects, e.g. a 9-byte payload is prefixed with the single byte
/// `'9'` (spec.md §8 scenario S1: `9calibrate`).
pub async fn write_frame(stream: &mut (impl AsyncWrite + Unpin), payload: &[u8]) -> std::io::Result<()> {
    let len_field = payload.len().to_string();
    debug_assert!(len_field.len() <= MAX_LEN_DIGITS, "frame too large to encode its own length");
    stream.write_all(len_field.as_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await
}

/// Reads one frame. The length field has no fixed width and no delimiter:
/// digits are consumed one byte at a time until a non-digit byte appears
/// (the first byte of the payload) or [`MAX_LEN_DIGITS`] digits have been
/// read, whichever comes first. The length field and payload may still
/// arrive in separate TCP segments with a gap (spec.md §4.5 tolerates
/// ~100-500ms); reading byte-by-byte tolerates that the same way two
/// independent `read_exact` calls would.
pub async fn read_frame(stream: &mut (impl AsyncRead + Unpin)) -> Result<Vec<u8>, ControlError> {
    let mut digits = String::new();
    let mut spillover: Option<u8> = None;

    for _ in 0..MAX_LEN_DIGITS {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ControlError::TransportClosed
            } else {
                ControlError::Io(e)
            }
        })?;

        if byte[0].is_ascii_digit() {
            digits.push(byte[0] as char);
        } else {
            spillover = Some(byte[0]);
            break;
        }
    }

    if digits.is_empty() {
        return Err(ControlError::ProtocolFraming("missing length field".to_string()));
    }
    let len: usize = digits
        .parse()
        .map_err(|_| ControlError::ProtocolFraming(format!("bad length field: {digits:?}")))?;

    let mut payload = Vec::with_capacity(len);
    if let Some(b) = spillover {
        payload.push(b);
    }
    if payload.len() < len {
        let mut rest = vec![0u8; len - payload.len()];
        stream.read_exact(&mut rest).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ControlError::TransportClosed
            } else {
                ControlError::Io(e)
            }
        })?;
        payload.extend_from_slice(&rest);
    }
    Ok(payload)
}

/// Shared handles every command may need.
#[derive(Clone)]
pub struct CommandContext {
    pub state: Arc<Mutex<TrackerState>>,
    pub tracker: Arc<Mutex<Tracker>>,
    pub rotator: Arc<std::sync::Mutex<Box<dyn Rotator>>>,
    pub sdr: Arc<std::sync::Mutex<Box<dyn Sdr>>>,
}

pub struct ControlServer {
    listener: TcpListener,
    ctx: CommandContext,
}

impl ControlServer {
    pub async fn bind(addr: &str, ctx: CommandContext) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, ctx })
    }

    /// Accepts connections forever, one at a time, per spec.md §4.5 ("serves
    /// a single client at a time; a second connection waits").
    pub async fn run(&mut self) {
        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    info!("client connected: {peer}");
                    if let Err(e) = self.handle_client(socket).await {
                        warn!("client {peer} disconnected: {e}");
                    } else {
                        info!("client {peer} disconnected");
                    }
                }
                Err(e) => error!("accept() failed: {e}"),
            }
        }
    }

    async fn handle_client(&mut self, mut socket: TcpStream) -> Result<(), ControlError> {
        loop {
            let payload = match read_frame(&mut socket).await {
                Ok(p) => p,
                Err(ControlError::TransportClosed) => return Ok(()),
                Err(e) => return Err(e),
            };

            if let Err(e) = command::dispatch(&payload, &self.ctx, &mut socket).await {
                warn!("command error: {e}");
                let _ = write_frame(&mut socket, e.to_string().as_bytes()).await;
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn reads_a_single_digit_length_abutting_the_payload() {
        // spec.md §8 scenario S1: "9calibrate", length and payload with no
        // delimiter and no padding between them.
        let mut stream = Cursor::new(b"9calibrate".to_vec());
        let payload = read_frame(&mut stream).await.unwrap();
        assert_eq!(payload, b"calibrate".to_vec());
    }

    #[tokio::test]
    async fn reads_a_multi_digit_length() {
        // 11-byte payload "getMeta!!!!" prefixed by the two-digit length "11".
        let mut stream = Cursor::new(b"11getMeta!!!!".to_vec());
        let payload = read_frame(&mut stream).await.unwrap();
        assert_eq!(payload, b"getMeta!!!!".to_vec());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"start_tracking").await.unwrap();
        let mut stream = Cursor::new(buf);
        let payload = read_frame(&mut stream).await.unwrap();
        assert_eq!(payload, b"start_tracking".to_vec());
    }

    #[tokio::test]
    async fn empty_stream_reports_transport_closed() {
        let mut stream = Cursor::new(Vec::<u8>::new());
        assert!(matches!(read_frame(&mut stream).await, Err(ControlError::TransportClosed)));
    }
}
