//! Refresh timing and the background fetch
//!
//! `RefreshScheduler` holds a single deadline that the frame loop polls, so
//! changing the period replaces the deadline instead of stacking timers.
//! `FetchWorker` runs the blocking fetch off the UI thread and hands results
//! back over a channel.

use crate::error::NetworkError;
use crate::traffic::source::TrafficSource;
use crate::traffic::TrafficEvent;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

pub type FetchResult = Result<Vec<TrafficEvent>, NetworkError>;

#[derive(Debug)]
pub struct RefreshScheduler {
    period: Duration,
    next_due: Option<Instant>,
    in_flight: bool,
}

impl RefreshScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next_due: None,
            in_flight: false,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight
    }

    /// Arm the timer one period from `now`
    pub fn start(&mut self, now: Instant) {
        self.next_due = Some(now + self.period);
    }

    /// Disarm. An in-flight fetch still has to be completed.
    pub fn stop(&mut self) {
        self.next_due = None;
    }

    /// Replace the period. A running timer is re-armed from `now`.
    pub fn set_period(&mut self, period: Duration, now: Instant) {
        self.period = period;
        if self.is_running() {
            self.start(now);
        }
        debug!(period_ms = period.as_millis() as u64, "refresh period changed");
    }

    /// True when a fetch should start now. A deadline that passes while a
    /// fetch is in flight is skipped, not queued.
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.next_due else {
            return false;
        };
        if now < due {
            return false;
        }
        self.next_due = Some(now + self.period);
        if self.in_flight {
            trace!("refresh skipped, fetch still in flight");
            return false;
        }
        self.in_flight = true;
        true
    }

    /// Request a fetch outside the timer. False if one is already running.
    pub fn fire_now(&mut self) -> bool {
        if self.in_flight {
            return false;
        }
        self.in_flight = true;
        true
    }

    pub fn complete(&mut self) {
        self.in_flight = false;
    }
}

/// Runs `fetch_batch` on a spawned thread per request
pub struct FetchWorker {
    source: Arc<dyn TrafficSource>,
    sender: Sender<FetchResult>,
    receiver: Receiver<FetchResult>,
}

impl FetchWorker {
    pub fn new(source: Arc<dyn TrafficSource>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            sender: tx,
            receiver: rx,
        }
    }

    pub fn describe(&self) -> String {
        self.source.describe()
    }

    /// Start a fetch (non-blocking)
    pub fn request(&self) {
        let source = Arc::clone(&self.source);
        let tx = self.sender.clone();
        thread::spawn(move || {
            let result = source.fetch_batch();
            let _ = tx.send(result);
        });
    }

    /// Completed fetch, if any
    pub fn try_recv(&self) -> Option<FetchResult> {
        match self.receiver.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn period_change_reschedules_once() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(10));
        scheduler.start(t0);

        let mut fired = Vec::new();
        let mut now = t0;
        while now <= t0 + Duration::from_secs(11) {
            if now == t0 + ms(1000) {
                scheduler.set_period(Duration::from_secs(2), now);
            }
            if scheduler.poll(now) {
                fired.push(now.duration_since(t0));
                scheduler.complete();
            }
            now += ms(100);
        }

        // Old 10 s deadline is gone; only the 2 s cadence from t0+1 s remains
        assert_eq!(
            fired,
            vec![ms(3000), ms(5000), ms(7000), ms(9000), ms(11_000)]
        );
    }

    #[test]
    fn due_while_fetching_is_skipped_without_backlog() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(1));
        scheduler.start(t0);

        assert!(scheduler.poll(t0 + ms(1000)));
        assert!(scheduler.is_fetching());
        // Two deadlines pass while the fetch is slow
        assert!(!scheduler.poll(t0 + ms(2000)));
        assert!(!scheduler.poll(t0 + ms(3000)));

        scheduler.complete();
        // Nothing queued: the next firing is a full period after the last skip
        assert!(!scheduler.poll(t0 + ms(3500)));
        assert!(scheduler.poll(t0 + ms(4000)));
    }

    #[test]
    fn stopped_scheduler_never_fires() {
        let t0 = Instant::now();
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(1));
        assert!(!scheduler.poll(t0 + Duration::from_secs(5)));

        scheduler.start(t0);
        scheduler.stop();
        assert!(!scheduler.is_running());
        assert!(!scheduler.poll(t0 + Duration::from_secs(5)));

        // set_period on a stopped timer does not arm it
        scheduler.set_period(Duration::from_millis(10), t0);
        assert!(!scheduler.is_running());
    }

    #[test]
    fn fire_now_respects_in_flight() {
        let mut scheduler = RefreshScheduler::new(Duration::from_secs(1));
        assert!(scheduler.fire_now());
        assert!(!scheduler.fire_now());
        scheduler.complete();
        assert!(scheduler.fire_now());
    }

    struct Fixed;

    impl TrafficSource for Fixed {
        fn fetch_batch(&self) -> FetchResult {
            Ok(vec![TrafficEvent::new("1.2.3.4", 1.0, 2.0, chrono::Utc::now())])
        }

        fn describe(&self) -> String {
            "fixed".into()
        }
    }

    #[test]
    fn worker_delivers_result() {
        let worker = FetchWorker::new(Arc::new(Fixed));
        assert!(worker.try_recv().is_none());
        worker.request();

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            if let Some(result) = worker.try_recv() {
                break result;
            }
            assert!(Instant::now() < deadline, "fetch never completed");
            thread::sleep(ms(5));
        };
        assert_eq!(result.unwrap().len(), 1);
        assert_eq!(worker.describe(), "fixed");
    }
}
