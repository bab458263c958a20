//! Tracker (spec.md §4.4): drains the Schedule one pass at a time, pointing
//! the rotator and driving a capture for each, in an `Idle -> Waiting ->
//! Capturing -> Completed -> Idle` loop.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use hifitime::{Duration, Epoch};
use log::{debug, info, warn};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::capture::device::{Sdr, TunerMode};
use crate::capture::{check_admission, directory_used_bytes, CaptureEngine, CapturePlan};
use crate::ephemeris::{self, SatelliteRef};
use crate::observer::Observer;
use crate::rotator::{in_reachable_box, Rotator};
use crate::schedule::{ProcessedWindow, Schedule, ViewingWindow};

fn duration_seconds(d: Duration) -> f64 {
    d.total_nanoseconds() as f64 / 1.0e9
}

/// Shared state, behind a single `tokio::sync::Mutex` (SPEC_FULL.md §2:
/// "single exclusion discipline rather than per-field locks").
pub struct TrackerState {
    pub schedule: Schedule,
    pub processed: Vec<ProcessedWindow>,
    pub pending_satellites: Vec<SatelliteRef>,
    pub frequencies: HashMap<String, VecDeque<u64>>,
    pub viewing_window: Option<(Epoch, Epoch)>,
    pub observer: Observer,
    pub tuner_mode: TunerMode,
    pub bandwidth_hz: u64,
    pub tracking_active: bool,
    pub recording_active: bool,
    pub current_pass: Option<ViewingWindow>,
    pub output_dir: PathBuf,
    pub storage_cap_gb: f64,
    pub default_center_freq_hz: u64,
}

impl TrackerState {
    pub fn new(observer: Observer, output_dir: PathBuf, storage_cap_gb: f64, default_center_freq_hz: u64) -> Self {
        Self {
            schedule: Schedule::new(),
            processed: Vec::new(),
            pending_satellites: Vec::new(),
            frequencies: HashMap::new(),
            viewing_window: None,
            observer,
            tuner_mode: TunerMode::Single,
            bandwidth_hz: TunerMode::Single.bandwidth_hz(),
            tracking_active: false,
            recording_active: false,
            current_pass: None,
            output_dir,
            storage_cap_gb,
            default_center_freq_hz,
        }
    }
}

/// Owns the background tracking task; `start`/`stop` are idempotent.
pub struct Tracker {
    state: Arc<Mutex<TrackerState>>,
    sdr: Arc<std::sync::Mutex<Box<dyn Sdr>>>,
    rotator: Arc<std::sync::Mutex<Box<dyn Rotator>>>,
    stop_tx: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Tracker {
    pub fn new(
        state: Arc<Mutex<TrackerState>>,
        sdr: Arc<std::sync::Mutex<Box<dyn Sdr>>>,
        rotator: Arc<std::sync::Mutex<Box<dyn Rotator>>>,
    ) -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            state,
            sdr,
            rotator,
            stop_tx,
            task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    pub async fn start(&mut self) {
        if self.task.is_some() {
            return;
        }
        let _ = self.stop_tx.send(false);

        {
            let mut locked = self.state.lock().await;
            locked.tracking_active = true;
        }

        let state = self.state.clone();
        let sdr = self.sdr.clone();
        let rotator = self.rotator.clone();
        let stop_rx = self.stop_tx.subscribe();

        self.task = Some(tokio::spawn(async move {
            run_tracker_loop(state.clone(), sdr, rotator, stop_rx).await;
            let mut locked = state.lock().await;
            locked.tracking_active = false;
            locked.current_pass = None;
        }));
    }

    pub async fn stop(&mut self) {
        let _ = self.stop_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn run_tracker_loop(
    state: Arc<Mutex<TrackerState>>,
    sdr: Arc<std::sync::Mutex<Box<dyn Sdr>>>,
    rotator: Arc<std::sync::Mutex<Box<dyn Rotator>>>,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        if *stop_rx.borrow() {
            return;
        }

        let next = {
            let mut locked = state.lock().await;
            locked.schedule.pop_front()
        };

        let Some(window) = next else {
            return; // empty schedule: back to Idle
        };

        let observer = {
            let mut locked = state.lock().await;
            locked.current_pass = Some(window.clone());
            locked.observer.clone()
        };

        info!(
            "{}: waiting for rise at {} ({})",
            window.name,
            window.rise_utc,
            observer.render_local(window.rise_utc)
        );
        if !wait_for_rise(&window, &mut stop_rx).await {
            debug!("stop requested while waiting for {}", window.name);
            return;
        }

        let completed = run_capture_and_point(&state, &sdr, &rotator, &window, &mut stop_rx).await;

        {
            let mut locked = state.lock().await;
            locked.processed.push(ProcessedWindow {
                window: window.clone(),
                completed,
            });
            locked.current_pass = None;
        }

        info!("{}: pass completed={completed}", window.name);
    }
}

/// Returns `false` if a stop was requested before rise.
async fn wait_for_rise(window: &ViewingWindow, stop_rx: &mut watch::Receiver<bool>) -> bool {
    loop {
        if *stop_rx.borrow() {
            return false;
        }
        let now = Epoch::now().unwrap_or(window.rise_utc);
        if now >= window.rise_utc {
            return true;
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(500)) => {}
            _ = stop_rx.changed() => {}
        }
    }
}

/// Runs one pass: picks up its queued frequency (or the default), checks
/// admission control, starts a capture, and points the rotator until the
/// pass sets or a stop is requested. Returns whether the pass ran to its
/// natural completion.
async fn run_capture_and_point(
    state: &Arc<Mutex<TrackerState>>,
    sdr: &Arc<std::sync::Mutex<Box<dyn Sdr>>>,
    rotator: &Arc<std::sync::Mutex<Box<dyn Rotator>>>,
    window: &ViewingWindow,
    stop_rx: &mut watch::Receiver<bool>,
) -> bool {
    let now = Epoch::now().unwrap_or(window.rise_utc);
    let duration_s = duration_seconds(window.set_utc - now).max(0.0);

    let (freq_hz, mode, output_dir, storage_cap_gb) = {
        let mut locked = state.lock().await;
        let freq_hz = locked
            .frequencies
            .get_mut(&window.name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(locked.default_center_freq_hz);
        (freq_hz, locked.tuner_mode, locked.output_dir.clone(), locked.storage_cap_gb)
    };

    let plan = CapturePlan {
        name: window.name.clone(),
        center_freq_hz: freq_hz,
        gain_db: 30.0,
        mode,
        sample_rate_hz: 10_000_000.0,
        duration_s,
        output_dir: output_dir.clone(),
    };

    let used_bytes = directory_used_bytes(&output_dir);
    if let Err(e) = check_admission(&plan, used_bytes, storage_cap_gb) {
        warn!("{}: capture refused: {e}", window.name);
        return false;
    }

    let mut engine = CaptureEngine::new(sdr.clone());
    if let Err(e) = engine.start(plan) {
        warn!("{}: capture setup failed: {e}", window.name);
        return false;
    }

    {
        let mut locked = state.lock().await;
        locked.recording_active = true;
    }

    let engine_stop = engine.stop_handle();
    let completed_on_time = pointing_loop(rotator.clone(), window.clone(), state.clone(), stop_rx.clone()).await;

    let _ = engine_stop.send(true);
    let paths = tokio::task::spawn_blocking(move || engine.stop()).await.unwrap_or_default();

    {
        let mut locked = state.lock().await;
        locked.recording_active = false;
    }

    debug!("{}: captured {} file(s)", window.name, paths.len());
    completed_on_time
}

/// Recomputes azel every 100ms and re-points the rotator when it moves more
/// than 1 degree since the last commanded position (the deadband, scenario
/// S4). Exits when `now_utc >= window.set_utc` or a stop is requested.
async fn pointing_loop(
    rotator: Arc<std::sync::Mutex<Box<dyn Rotator>>>,
    window: ViewingWindow,
    state: Arc<Mutex<TrackerState>>,
    mut stop_rx: watch::Receiver<bool>,
) -> bool {
    const DEADBAND_DEG: f64 = 1.0;
    let mut last_commanded: Option<(f64, f64)> = None;

    loop {
        let now = Epoch::now().unwrap_or(window.set_utc);
        if now >= window.set_utc {
            return true;
        }
        if *stop_rx.borrow() {
            return false;
        }

        let observer = { state.lock().await.observer.clone() };
        match ephemeris::azel(&window.sat, &observer, now) {
            Ok((az, el)) => {
                let moved_enough = match last_commanded {
                    None => true,
                    Some((paz, pel)) => (az - paz).abs() > DEADBAND_DEG || (el - pel).abs() > DEADBAND_DEG,
                };

                if moved_enough {
                    if in_reachable_box(az, el) {
                        let outcome = rotator.lock().unwrap().mov(az, el);
                        match outcome {
                            Ok(()) => last_commanded = Some((az, el)),
                            Err(e) => warn!("{}: rotator move failed: {e}", window.name),
                        }
                    } else {
                        debug!("{}: az={az:.1} el={el:.1} outside reachable box, holding", window.name);
                    }
                }
            }
            Err(e) => warn!("{}: azel computation failed: {e}", window.name),
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(100)) => {}
            _ = stop_rx.changed() => {}
        }
    }
}
