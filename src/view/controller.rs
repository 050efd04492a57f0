//! Ties the playback session to the refresh timer and the fetch worker.
//!
//! Everything here runs on the frame loop's thread. The only concurrency is
//! the worker's fetch, whose result is picked up at the start of a frame.

use crate::config::PlaybackConfig;
use crate::playback::{PlayState, PlaybackSession, TickReport};
use crate::scheduler::{FetchWorker, RefreshScheduler};
use crate::traffic::source::TrafficSource;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub const MIN_DISPLAY: Duration = Duration::from_secs(1);
pub const MAX_DISPLAY: Duration = Duration::from_secs(60);

/// What happened during one frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub tick: TickReport,
    /// Fetches that finished this frame
    pub completed: usize,
    /// A finished fetch replaced the event set
    pub batch_applied: bool,
    pub fetch_failed: bool,
    pub fetch_started: bool,
}

pub struct Controller {
    session: PlaybackSession,
    scheduler: RefreshScheduler,
    worker: FetchWorker,
    last_error: Option<String>,
    last_refresh: Option<DateTime<Local>>,
}

impl Controller {
    pub fn new(source: Arc<dyn TrafficSource>, config: PlaybackConfig) -> Self {
        Self {
            scheduler: RefreshScheduler::new(config.display_duration),
            session: PlaybackSession::new(config),
            worker: FetchWorker::new(source),
            last_error: None,
            last_refresh: None,
        }
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn scheduler(&self) -> &RefreshScheduler {
        &self.scheduler
    }

    pub fn source_name(&self) -> String {
        self.worker.describe()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_refresh(&self) -> Option<DateTime<Local>> {
        self.last_refresh
    }

    pub fn display_duration(&self) -> Duration {
        self.session.config().display_duration
    }

    /// Initial fetch, then arm the timer
    pub fn begin(&mut self, now: Instant) {
        self.request_fetch();
        self.scheduler.start(now);
    }

    pub fn frame(&mut self, now: Instant) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();

        while let Some(result) = self.worker.try_recv() {
            self.scheduler.complete();
            outcome.completed += 1;
            match result {
                Ok(events) => {
                    let count = events.len();
                    if self.session.apply_batch(events) {
                        info!(events = count, "traffic batch applied");
                        self.last_refresh = Some(Local::now());
                        self.last_error = None;
                        outcome.batch_applied = true;
                    }
                }
                Err(err) => {
                    warn!(%err, "refresh failed, keeping previous data");
                    self.last_error = Some(err.to_string());
                    outcome.fetch_failed = true;
                }
            }
        }

        if self.scheduler.poll(now) {
            self.worker.request();
            outcome.fetch_started = true;
        }

        outcome.tick = self.session.tick(now);
        outcome
    }

    /// Space bar. Pausing also stops the refresh timer; resuming restarts it.
    pub fn toggle_pause(&mut self, now: Instant) -> PlayState {
        match self.session.state() {
            PlayState::Playing => {
                self.session.pause(now);
                self.scheduler.stop();
            }
            PlayState::Paused => {
                self.session.resume(now);
                self.scheduler.start(now);
            }
        }
        self.session.state()
    }

    /// Replay the current set from the start; fetches fresh data when playing
    pub fn reset(&mut self) {
        let events = self.session.events().to_vec();
        if self.session.reset(events) {
            self.request_fetch();
        }
    }

    /// Change how long markers stay visible. The refresh period follows.
    pub fn set_display_duration(&mut self, display: Duration, now: Instant) -> Duration {
        let display = display.clamp(MIN_DISPLAY, MAX_DISPLAY);
        let fade = self.session.config().fade_duration;
        self.session.set_timing(display, fade);
        self.scheduler.set_period(display, now);
        display
    }

    fn request_fetch(&mut self) {
        if self.scheduler.fire_now() {
            self.worker.request();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetworkError;
    use crate::scheduler::FetchResult;
    use crate::traffic::TrafficEvent;
    use chrono::Utc;
    use std::io;
    use std::sync::mpsc::{self, Receiver, Sender};
    use std::sync::Mutex;
    use std::thread;

    /// Each fetch blocks until the test hands it a result
    struct GatedSource {
        gate: Mutex<Receiver<FetchResult>>,
    }

    impl TrafficSource for GatedSource {
        fn fetch_batch(&self) -> FetchResult {
            let gate = self.gate.lock().map_err(|_| NetworkError::Body(io::Error::other("poisoned")))?;
            gate.recv()
                .unwrap_or_else(|_| Err(NetworkError::Body(io::Error::other("gate closed"))))
        }

        fn describe(&self) -> String {
            "gated".into()
        }
    }

    fn gated() -> (Controller, Sender<FetchResult>) {
        let (tx, rx) = mpsc::channel();
        let source = Arc::new(GatedSource { gate: Mutex::new(rx) });
        let config = PlaybackConfig {
            display_duration: Duration::from_secs(10),
            ..PlaybackConfig::default()
        };
        (Controller::new(source, config), tx)
    }

    fn events(n: usize) -> Vec<TrafficEvent> {
        (0..n)
            .map(|i| TrafficEvent::new(format!("192.0.2.{}", i % 250), 10.0, 20.0, Utc::now()))
            .collect()
    }

    /// Run frames at a fixed instant until a fetch completes
    fn until_completed(controller: &mut Controller, now: Instant) -> FrameOutcome {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let outcome = controller.frame(now);
            if outcome.completed > 0 {
                return outcome;
            }
            assert!(Instant::now() < deadline, "fetch never completed");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn initial_fetch_is_applied() {
        let (mut controller, tx) = gated();
        let t0 = Instant::now();
        controller.begin(t0);
        assert!(controller.scheduler().is_fetching());

        tx.send(Ok(events(200))).unwrap();
        let outcome = until_completed(&mut controller, t0);
        assert!(outcome.batch_applied);
        assert_eq!(controller.session().len(), 200);
        assert_eq!(controller.session().summary().total(), 200);
        assert!(!controller.scheduler().is_fetching());
        assert!(controller.last_refresh().is_some());
        // Same frame already drew the first batch
        assert_eq!(outcome.tick.emitted, 2);
    }

    #[test]
    fn fetch_completing_after_pause_is_discarded() {
        let (mut controller, tx) = gated();
        let t0 = Instant::now();
        controller.begin(t0);
        tx.send(Ok(events(100))).unwrap();
        until_completed(&mut controller, t0);

        // A few frames of playback
        for i in 1..=5 {
            controller.frame(t0 + Duration::from_millis(16 * i));
        }

        // The timer fires and a fetch goes out
        let t1 = t0 + Duration::from_secs(10);
        let outcome = controller.frame(t1);
        assert!(outcome.fetch_started);
        let cursor = controller.session().cursor();
        let markers = controller.session().markers().len();

        assert_eq!(controller.toggle_pause(t1), PlayState::Paused);
        tx.send(Ok(events(400))).unwrap();
        let outcome = until_completed(&mut controller, t1 + Duration::from_millis(16));

        assert!(!outcome.batch_applied);
        assert_eq!(controller.session().state(), PlayState::Paused);
        assert_eq!(controller.session().len(), 100);
        assert_eq!(controller.session().cursor(), cursor);
        assert_eq!(controller.session().markers().len(), markers);
        assert!(!controller.scheduler().is_fetching());
        assert!(!controller.scheduler().is_running());
    }

    #[test]
    fn failed_refresh_keeps_previous_data() {
        let (mut controller, tx) = gated();
        let t0 = Instant::now();
        controller.begin(t0);
        tx.send(Ok(events(50))).unwrap();
        until_completed(&mut controller, t0);

        controller.reset();
        assert!(controller.scheduler().is_fetching());
        tx.send(Err(NetworkError::Status { status: 503 })).unwrap();
        let outcome = until_completed(&mut controller, t0);

        assert!(outcome.fetch_failed);
        assert_eq!(controller.session().len(), 50);
        assert_eq!(controller.last_error(), Some("backend returned HTTP 503"));
        // Timer keeps running for the next attempt
        assert!(controller.scheduler().is_running());
    }

    #[test]
    fn reset_while_paused_does_not_fetch() {
        let (mut controller, tx) = gated();
        let t0 = Instant::now();
        controller.begin(t0);
        tx.send(Ok(events(30))).unwrap();
        until_completed(&mut controller, t0);
        controller.frame(t0 + Duration::from_millis(16));

        controller.toggle_pause(t0);
        controller.reset();
        assert!(!controller.scheduler().is_fetching());
        assert_eq!(controller.session().cursor(), 0);
        assert!(controller.session().markers().is_empty());
        assert_eq!(controller.session().state(), PlayState::Paused);
    }

    #[test]
    fn resume_restarts_timer() {
        let (mut controller, _tx) = gated();
        let t0 = Instant::now();
        controller.begin(t0);
        controller.toggle_pause(t0);
        assert!(!controller.scheduler().is_running());
        assert_eq!(controller.toggle_pause(t0), PlayState::Playing);
        assert!(controller.scheduler().is_running());
    }

    #[test]
    fn display_duration_is_clamped_and_drives_period() {
        let (mut controller, _tx) = gated();
        let t0 = Instant::now();
        assert_eq!(controller.set_display_duration(Duration::from_secs(2), t0), Duration::from_secs(2));
        assert_eq!(controller.scheduler().period(), Duration::from_secs(2));
        assert_eq!(controller.display_duration(), Duration::from_secs(2));

        assert_eq!(controller.set_display_duration(Duration::ZERO, t0), MIN_DISPLAY);
        assert_eq!(controller.set_display_duration(Duration::from_secs(600), t0), MAX_DISPLAY);
    }
}
