//! Command table dispatch (spec.md §6).

use std::io::Read;
use std::sync::Arc;

use hifitime::{Duration, Epoch};
use log::info;
use tokio::net::TcpStream;

use crate::capture::device::TunerMode;
use crate::capture::{check_admission, directory_used_bytes, CaptureEngine, CapturePlan};
use crate::error::ControlError;
use crate::observer::Observer;
use crate::utils;

use super::metadata::{DateTimePayload, MetadataSnapshot, ProcessedWindowWire, ViewingWindowWire, METADATA_VERSION};
use super::{read_frame, write_frame, CommandContext};

pub async fn dispatch(payload: &[u8], ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let text = String::from_utf8_lossy(payload);
    let mut parts = text.splitn(2, ' ');
    let cmd = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim();

    match cmd {
        "shutdown" => {
            write_frame(socket, b"Shutting down...").await?;
            info!("shutdown requested by control client");
            let _ = std::process::Command::new("shutdown").args(["-h", "now"]).spawn();
        }
        "reboot" => {
            write_frame(socket, b"Rebooting...").await?;
            info!("reboot requested by control client");
            let _ = std::process::Command::new("reboot").spawn();
        }
        "move" => handle_move(rest, ctx, socket).await?,
        "calibrate" => handle_calibrate(ctx, socket).await?,
        "calibrate_date_time" => handle_calibrate_date_time(socket).await?,
        "set_single_tuner" => handle_set_tuner(TunerMode::Single, ctx, socket).await?,
        "set_dual_tuner" => handle_set_tuner(TunerMode::Dual, ctx, socket).await?,
        "setViewingWindow" => handle_set_viewing_window(rest, ctx, socket).await?,
        "setCord" => handle_set_cord(rest, ctx, socket).await?,
        "add_to_queue" => handle_add_to_queue(rest, ctx, socket).await?,
        "clear_schedule" => {
            ctx.state.lock().await.schedule.clear();
            write_frame(socket, b"Schedule cleared").await?;
        }
        "getMeta" => handle_get_meta(ctx, socket).await?,
        "get" => handle_get_file(rest, ctx, socket).await?,
        "record_fixed" => handle_record_fixed(rest, ctx, socket).await?,
        "start_tracking" => {
            ctx.tracker.lock().await.start().await;
            write_frame(socket, b"Tracking started.").await?;
        }
        "stop_tracking" => {
            ctx.tracker.lock().await.stop().await;
            write_frame(socket, b"Tracking stopped.").await?;
        }
        "device_get" => {
            let descriptor = ctx.sdr.lock().unwrap().descriptor();
            write_frame(socket, descriptor.as_bytes()).await?;
        }
        "" => return Err(ControlError::UnknownCommand("<empty>".to_string())),
        other => return Err(ControlError::UnknownCommand(other.to_string())),
    }

    Ok(())
}

async fn handle_move(rest: &str, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let mut nums = rest.split_whitespace();
    let az: Option<f64> = nums.next().and_then(|s| s.parse().ok());
    let el: Option<f64> = nums.next().and_then(|s| s.parse().ok());

    match (az, el) {
        (Some(az), Some(el)) => {
            let outcome = ctx.rotator.lock().unwrap().mov(az, el);
            match outcome {
                Ok(()) => write_frame(socket, b"Moved").await?,
                Err(e) => write_frame(socket, e.to_string().as_bytes()).await?,
            }
        }
        _ => write_frame(socket, b"invalid arguments").await?,
    }
    Ok(())
}

async fn handle_calibrate(ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let reply = ctx.rotator.lock().unwrap().calibrate();
    match reply {
        Ok(r) => write_frame(socket, r.as_bytes()).await?,
        Err(e) => write_frame(socket, e.to_string().as_bytes()).await?,
    }
    Ok(())
}

async fn handle_calibrate_date_time(socket: &mut TcpStream) -> Result<(), ControlError> {
    write_frame(socket, b"Waiting on date time info").await?;
    let payload = read_frame(socket).await?;

    match bincode::deserialize::<DateTimePayload>(&payload) {
        Ok(dt) => info!("calibrate_date_time: {} / {}", dt.datetime, dt.timezone),
        Err(e) => log::warn!("calibrate_date_time: bad payload: {e}"),
    }

    write_frame(socket, b"Finished setting datetime").await?;
    Ok(())
}

async fn handle_set_tuner(mode: TunerMode, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let mut locked = ctx.state.lock().await;
    if locked.recording_active {
        drop(locked);
        write_frame(socket, b"cannot switch tuner mode while recording").await?;
        return Ok(());
    }
    locked.tuner_mode = mode;
    locked.bandwidth_hz = mode.bandwidth_hz();
    drop(locked);

    let reply = match mode {
        TunerMode::Single => "set_single_tuner",
        TunerMode::Dual => "set_dual_tuner",
    };
    write_frame(socket, reply.as_bytes()).await?;
    Ok(())
}

/// Parses `setViewingWindow YYYY-MM-DD HH:MM:SS YYYY-MM-DD HH:MM:SS`
/// (spec.md §6: trailing arguments are space-delimited unless noted), i.e.
/// four whitespace tokens forming two `date time` pairs.
async fn handle_set_viewing_window(rest: &str, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let tokens: Vec<&str> = rest.split_whitespace().collect();
    let parsed = match tokens.as_slice() {
        [start_date, start_time, end_date, end_time] => {
            let start = utils::parse_utc_datetime(&format!("{start_date} {start_time}"));
            let end = utils::parse_utc_datetime(&format!("{end_date} {end_time}"));
            start.zip(end)
        }
        _ => None,
    };

    match parsed {
        Some((start, end)) if start < end => {
            ctx.state.lock().await.viewing_window = Some((start, end));
            write_frame(socket, b"setViewingWindow").await?;
        }
        _ => write_frame(socket, b"invalid viewing window").await?,
    }
    Ok(())
}

async fn handle_set_cord(rest: &str, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let mut it = rest.split_whitespace();
    let lat: Option<f64> = it.next().and_then(|s| s.parse().ok());
    let lon: Option<f64> = it.next().and_then(|s| s.parse().ok());

    match (lat, lon) {
        (Some(lat), Some(lon)) => {
            let mut locked = ctx.state.lock().await;
            let elevation_m = locked.observer.elevation_m;
            locked.observer = Observer::new(lat, lon, elevation_m);
            write_frame(socket, b"setCord").await?;
        }
        _ => write_frame(socket, b"invalid coordinates").await?,
    }
    Ok(())
}

async fn handle_add_to_queue(rest: &str, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let (tle_part, freq_part) = rest.split_once("\n\n").unwrap_or((rest, ""));

    let specs = match utils::parse_tle_block(tle_part) {
        Ok(specs) => specs,
        Err(e) => {
            write_frame(socket, format!("bad TLE block: {e}").as_bytes()).await?;
            return Ok(());
        }
    };

    let freqs = utils::parse_frequency_block(freq_part);
    let refs: Vec<_> = specs
        .into_iter()
        .map(|mut spec| {
            if let Some(f) = freqs.get(&spec.name) {
                spec.frequencies = f.clone();
            }
            Arc::new(spec)
        })
        .collect();

    let mut locked = ctx.state.lock().await;
    for sat in &refs {
        if !sat.frequencies.is_empty() {
            locked
                .frequencies
                .insert(sat.name.clone(), sat.frequencies.iter().copied().collect());
        }
    }

    // Open Question resolved (SPEC_FULL.md §4.3): default window is
    // [now, now + 8h] when the client hasn't called setViewingWindow.
    let (start, end) = locked.viewing_window.unwrap_or_else(|| {
        let now = Epoch::now().unwrap_or_else(|_| Epoch::from_unix_seconds(0.0));
        (now, now + Duration::from_hours(8.0))
    });

    let observer = locked.observer.clone();
    locked.schedule.extend(&refs, start, end, &observer);
    locked.pending_satellites.extend(refs);

    write_frame(socket, b"Schedule updated").await?;
    Ok(())
}

async fn handle_get_meta(ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let locked = ctx.state.lock().await;
    let used = directory_used_bytes(&locked.output_dir);
    let now = Epoch::now().unwrap_or_else(|_| Epoch::from_unix_seconds(0.0));

    let snapshot = MetadataSnapshot {
        version: METADATA_VERSION,
        used_space_bytes: used,
        is_recording: locked.recording_active,
        directory: locked.output_dir.display().to_string(),
        current_time_utc: utils::format_utc_rfc3339(now),
        schedule: locked
            .schedule
            .windows()
            .iter()
            .map(|w| ViewingWindowWire {
                name: w.name.clone(),
                rise_utc: utils::format_utc_rfc3339(w.rise_utc),
                set_utc: utils::format_utc_rfc3339(w.set_utc),
            })
            .collect(),
        processed_schedule: locked
            .processed
            .iter()
            .map(|p| ProcessedWindowWire {
                name: p.window.name.clone(),
                rise_utc: utils::format_utc_rfc3339(p.window.rise_utc),
                set_utc: utils::format_utc_rfc3339(p.window.set_utc),
                completed: p.completed,
            })
            .collect(),
        tracking: locked.tracking_active,
    };
    drop(locked);

    let bytes = snapshot.encode().map_err(|e| ControlError::ProtocolFraming(e.to_string()))?;
    write_frame(socket, &bytes).await?;
    Ok(())
}

async fn handle_get_file(rest: &str, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let mut it = rest.split_whitespace();
    let rel_path = it.next().unwrap_or("");
    let chunk_size: usize = it.next().and_then(|s| s.parse().ok()).unwrap_or(4096).max(1);

    let base = ctx.state.lock().await.output_dir.clone();
    let requested = base.join(rel_path);

    let base_canonical = std::fs::canonicalize(&base).unwrap_or(base);
    let resolved = std::fs::canonicalize(&requested)
        .ok()
        .filter(|p| p.starts_with(&base_canonical));

    match resolved.and_then(|p| std::fs::File::open(p).ok()) {
        Some(mut file) => {
            let size = file.metadata()?.len();
            write_frame(socket, size.to_string().as_bytes()).await?;

            let mut buf = vec![0u8; chunk_size];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                write_frame(socket, &buf[..n]).await?;
            }
        }
        None => write_frame(socket, b"File not found").await?,
    }
    Ok(())
}

async fn handle_record_fixed(rest: &str, ctx: &CommandContext, socket: &mut TcpStream) -> Result<(), ControlError> {
    let mut it = rest.split_whitespace();
    let name = it.next().unwrap_or("record").to_string();
    let duration_s: f64 = it.next().and_then(|s| s.parse().ok()).unwrap_or(0.0);
    let freq_hz: u64 = it.next().and_then(|s| s.parse().ok()).unwrap_or(0);

    let (mode, output_dir, storage_cap_gb) = {
        let locked = ctx.state.lock().await;
        (locked.tuner_mode, locked.output_dir.clone(), locked.storage_cap_gb)
    };

    let plan = CapturePlan {
        name,
        center_freq_hz: freq_hz,
        gain_db: 30.0,
        mode,
        sample_rate_hz: 10_000_000.0,
        duration_s,
        output_dir: output_dir.clone(),
    };

    let used = directory_used_bytes(&output_dir);
    if check_admission(&plan, used, storage_cap_gb).is_err() {
        write_frame(socket, b"Insufficient storage").await?;
        return Ok(());
    }

    let sdr = ctx.sdr.clone();
    let state = ctx.state.clone();
    {
        let mut locked = ctx.state.lock().await;
        locked.recording_active = true;
    }

    tokio::spawn(async move {
        let mut engine = CaptureEngine::new(sdr);
        if engine.start(plan).is_ok() {
            tokio::time::sleep(std::time::Duration::from_secs_f64(duration_s)).await;
            let _ = tokio::task::spawn_blocking(move || engine.stop()).await;
        }
        let mut locked = state.lock().await;
        locked.recording_active = false;
    });

    write_frame(socket, b"Recording").await?;
    Ok(())
}
