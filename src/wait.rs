//! Cluster status polling
//!
//! Implements the wait loop behind `lava clusters wait` and the `--wait`
//! flags on create/resize: poll a cluster until it reaches a terminal
//! state, with a bounded deadline, a minimum poll interval, and in-place
//! progress output on the terminal.

use std::future::Future;
use std::io::Write;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::debug;

use crate::error::LavaError;

/// Default spacing between polls.
pub const WAIT_INTERVAL: Duration = Duration::from_secs(30);

/// Floor applied to any requested poll interval.
pub const MIN_INTERVAL: Duration = Duration::from_secs(10);

/// Deadline used when no timeout is given. Large enough to never matter in
/// practice while keeping the deadline arithmetic finite.
const UNBOUNDED: Duration = Duration::from_secs(365 * 24 * 60 * 60);

const IN_PROGRESS_STATES: [&str; 8] = [
    "BUILDING",
    "BUILD",
    "CONFIGURING",
    "CONFIGURED",
    "UPDATING",
    "REBOOTING",
    "RESIZING",
    "WAITING",
];

/// Classification of a raw cluster status string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// The cluster is usable; polling stops successfully
    Active,
    /// The cluster is still transitioning and should be polled again
    InProgress,
    /// Terminal non-success. Statuses this client does not recognize land
    /// here as well, so a novel backend state ends the loop instead of
    /// polling forever.
    Failed,
}

/// Classify a status string, case-insensitively.
pub fn classify(status: &str) -> StatusKind {
    let status = status.to_uppercase();
    if status == "ACTIVE" {
        StatusKind::Active
    } else if IN_PROGRESS_STATES.contains(&status.as_str()) {
        StatusKind::InProgress
    } else {
        StatusKind::Failed
    }
}

/// The two fields of a polled resource the wait loop reads
pub trait Snapshot {
    fn id(&self) -> &str;
    fn status(&self) -> &str;
}

/// Time source and sleep primitive for the wait loop, injectable so tests
/// can drive the loop against a virtual clock.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by tokio's timer
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Deadline arithmetic for a single wait call
#[derive(Debug, Clone, Copy)]
pub struct PollClock {
    start: Instant,
    deadline: Instant,
}

impl PollClock {
    pub fn new(start: Instant, timeout: Option<Duration>) -> Self {
        Self {
            start,
            deadline: start + timeout.unwrap_or(UNBOUNDED),
        }
    }

    /// The deadline has already passed.
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    /// Sleeping another full interval would run past the deadline, so the
    /// loop should stop now rather than oversleep.
    pub fn should_stop_before_sleep(&self, now: Instant, interval: Duration) -> bool {
        now + interval >= self.deadline
    }

    pub fn elapsed_minutes(&self, now: Instant) -> f64 {
        now.duration_since(self.start).as_secs_f64() / 60.0
    }

    #[cfg(test)]
    fn deadline(&self) -> Instant {
        self.deadline
    }
}

/// Timeout and poll spacing for one wait call
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitConfig {
    /// Total time allowed before the wait times out; `None` is effectively
    /// unbounded
    pub timeout: Option<Duration>,
    /// Requested spacing between polls; clamped to [`MIN_INTERVAL`]
    pub interval: Option<Duration>,
}

impl WaitConfig {
    /// The poll spacing actually used
    pub fn effective_interval(&self) -> Duration {
        self.interval.unwrap_or(WAIT_INTERVAL).max(MIN_INTERVAL)
    }
}

/// Incremental progress sink for the wait loop.
///
/// The first snapshot prints a banner; subsequent snapshots overwrite the
/// status line in place by backspacing over the previous one, and an
/// `ACTIVE` snapshot closes the updating region with a blank line. In
/// silent mode nothing is written and each snapshot is only logged at
/// debug level. Output failures are swallowed: a broken pipe must not
/// mask the wait result.
pub struct ProgressReporter<W> {
    out: W,
    silent: bool,
    started: bool,
    last_len: usize,
}

impl<W: Write> ProgressReporter<W> {
    pub fn new(out: W, silent: bool) -> Self {
        Self {
            out,
            silent,
            started: false,
            last_len: 0,
        }
    }

    pub fn on_snapshot(&mut self, id: &str, status: &str, elapsed_minutes: f64) {
        debug!("Cluster {}: {}", id, status);

        if self.silent {
            return;
        }

        if !self.started {
            self.started = true;
            self.last_len = 0;
            let _ = writeln!(self.out, "Waiting for cluster {}", id);
        }

        let msg = format!(
            "Status: {} (Elapsed time: {:.1} minutes)",
            status, elapsed_minutes
        );
        let erase = "\u{8}".repeat(self.last_len);
        let _ = write!(self.out, "{}{}", erase, msg);
        let _ = self.out.flush();
        self.last_len = msg.len();

        if classify(status) == StatusKind::Active {
            let _ = writeln!(self.out, "\n");
        }
    }
}

/// Drives the poll loop: fetch, classify, report, sleep, repeat until a
/// terminal state or the deadline.
pub struct WaitController<C, W> {
    config: WaitConfig,
    clock: C,
    reporter: ProgressReporter<W>,
}

impl<C: Clock, W: Write> WaitController<C, W> {
    pub fn new(config: WaitConfig, clock: C, reporter: ProgressReporter<W>) -> Self {
        Self {
            config,
            clock,
            reporter,
        }
    }

    /// Poll until the fetched status classifies as terminal.
    ///
    /// Fetch errors propagate unchanged; the loop adds no retries of its
    /// own. Returns the final snapshot on `ACTIVE`, [`LavaError::Failed`]
    /// on any terminal non-success status, and [`LavaError::Timeout`] when
    /// the deadline is reached first.
    pub async fn run<T, F, Fut>(mut self, mut fetch: F) -> Result<T, LavaError>
    where
        T: Snapshot,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, LavaError>>,
    {
        let interval = self.config.effective_interval();
        let clock = PollClock::new(self.clock.now(), self.config.timeout);

        while !clock.is_expired(self.clock.now()) {
            let snapshot = fetch().await?;
            self.reporter.on_snapshot(
                snapshot.id(),
                snapshot.status(),
                clock.elapsed_minutes(self.clock.now()),
            );

            match classify(snapshot.status()) {
                StatusKind::Active => return Ok(snapshot),
                StatusKind::Failed => {
                    return Err(LavaError::Failed {
                        status: snapshot.status().to_string(),
                    })
                }
                StatusKind::InProgress => {}
            }

            if clock.should_stop_before_sleep(self.clock.now(), interval) {
                break;
            }

            self.clock.sleep(interval).await;
        }

        Err(LavaError::Timeout(
            "Cluster did not become active before timeout".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio_test::block_on;

    #[derive(Debug, Clone)]
    struct TestSnapshot {
        id: String,
        status: String,
    }

    impl TestSnapshot {
        fn new(status: &str) -> Self {
            Self {
                id: "cluster-1".to_string(),
                status: status.to_string(),
            }
        }
    }

    impl Snapshot for TestSnapshot {
        fn id(&self) -> &str {
            &self.id
        }

        fn status(&self) -> &str {
            &self.status
        }
    }

    /// Virtual clock: sleeping advances time instantly and is recorded.
    struct MockClock {
        base: Instant,
        offset: Mutex<Duration>,
        sleeps: Mutex<Vec<Duration>>,
    }

    impl MockClock {
        fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
                sleeps: Mutex::new(Vec::new()),
            }
        }

        fn sleep_count(&self) -> usize {
            self.sleeps.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Clock for &MockClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            *self.offset.lock().unwrap() += duration;
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    /// Controller over a scripted fetch sequence; counts fetches.
    fn run_scripted(
        statuses: &[&str],
        config: WaitConfig,
        clock: &MockClock,
    ) -> (Result<TestSnapshot, LavaError>, usize) {
        let script: RefCell<VecDeque<String>> =
            RefCell::new(statuses.iter().map(|s| s.to_string()).collect());
        let fetches = RefCell::new(0usize);

        let controller =
            WaitController::new(config, clock, ProgressReporter::new(Vec::new(), true));
        let result = block_on(controller.run(|| {
            *fetches.borrow_mut() += 1;
            // Repeat the last scripted status once the script runs dry.
            let status = {
                let mut script = script.borrow_mut();
                if script.len() > 1 {
                    script.pop_front().unwrap()
                } else {
                    script.front().cloned().unwrap()
                }
            };
            async move { Ok(TestSnapshot::new(&status)) }
        }));

        let count = *fetches.borrow();
        (result, count)
    }

    #[test]
    fn test_classify_active() {
        assert_eq!(classify("ACTIVE"), StatusKind::Active);
        assert_eq!(classify("active"), StatusKind::Active);
        assert_eq!(classify("Active"), StatusKind::Active);
    }

    #[test]
    fn test_classify_in_progress_states() {
        for status in IN_PROGRESS_STATES {
            assert_eq!(classify(status), StatusKind::InProgress, "{}", status);
        }
        assert_eq!(classify("building"), StatusKind::InProgress);
    }

    #[test]
    fn test_classify_failures() {
        assert_eq!(classify("ERROR"), StatusKind::Failed);
        assert_eq!(classify("error"), StatusKind::Failed);
        assert_eq!(classify("SOMETHING_NEW"), StatusKind::Failed);
        assert_eq!(classify(""), StatusKind::Failed);
    }

    #[test]
    fn test_classify_case_insensitive() {
        for status in ["ACTIVE", "BUILDING", "ERROR", "ReSiZiNg"] {
            assert_eq!(classify(status), classify(&status.to_lowercase()));
            assert_eq!(classify(status), classify(&status.to_uppercase()));
        }
    }

    #[test]
    fn test_interval_floor() {
        let config = WaitConfig {
            timeout: None,
            interval: Some(Duration::from_secs(1)),
        };
        assert_eq!(config.effective_interval(), Duration::from_secs(10));

        let config = WaitConfig {
            timeout: None,
            interval: Some(Duration::from_secs(60)),
        };
        assert_eq!(config.effective_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_interval_default() {
        assert_eq!(
            WaitConfig::default().effective_interval(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_deadline_default_is_a_year() {
        let start = Instant::now();
        let clock = PollClock::new(start, None);
        let delta = clock.deadline() - start;
        assert!(delta >= Duration::from_secs(364 * 24 * 60 * 60));
        assert!(delta <= Duration::from_secs(366 * 24 * 60 * 60));
    }

    #[test]
    fn test_should_stop_before_sleep() {
        let start = Instant::now();
        let clock = PollClock::new(start, Some(Duration::from_secs(50)));
        let interval = Duration::from_secs(30);

        assert!(!clock.should_stop_before_sleep(start, interval));
        assert!(clock.should_stop_before_sleep(start + Duration::from_secs(20), interval));
        assert!(clock.should_stop_before_sleep(start + Duration::from_secs(30), interval));
    }

    #[test]
    fn test_elapsed_minutes() {
        let start = Instant::now();
        let clock = PollClock::new(start, None);
        let elapsed = clock.elapsed_minutes(start + Duration::from_secs(90));
        assert!((elapsed - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_wait_returns_active_snapshot() {
        let clock = MockClock::new();
        let config = WaitConfig {
            timeout: None,
            interval: Some(Duration::from_secs(10)),
        };

        let (result, fetches) =
            run_scripted(&["BUILDING", "CONFIGURING", "ACTIVE"], config, &clock);

        let snapshot = result.unwrap();
        assert_eq!(snapshot.status, "ACTIVE");
        assert_eq!(fetches, 3);
        assert_eq!(clock.sleep_count(), 2);
    }

    #[test]
    fn test_wait_raises_failed_on_error_status() {
        let clock = MockClock::new();
        let config = WaitConfig {
            timeout: None,
            interval: Some(Duration::from_secs(10)),
        };

        let (result, fetches) = run_scripted(&["BUILDING", "ERROR"], config, &clock);

        match result {
            Err(LavaError::Failed { status }) => assert_eq!(status, "ERROR"),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert_eq!(fetches, 2);
    }

    #[test]
    fn test_wait_times_out_without_oversleeping() {
        let clock = MockClock::new();
        let config = WaitConfig {
            timeout: Some(Duration::from_secs(60)),
            interval: Some(Duration::from_secs(30)),
        };

        let (result, fetches) = run_scripted(&["BUILDING"], config, &clock);

        assert!(matches!(result, Err(LavaError::Timeout(_))));
        // Poll at t=0, sleep to t=30, poll again; sleeping again would
        // land on the deadline, so the loop stops after two polls.
        assert_eq!(fetches, 2);
        assert_eq!(clock.sleep_count(), 1);
    }

    #[test]
    fn test_wait_zero_timeout_never_fetches() {
        let clock = MockClock::new();
        let config = WaitConfig {
            timeout: Some(Duration::ZERO),
            interval: Some(Duration::from_secs(10)),
        };

        let (result, fetches) = run_scripted(&["BUILDING"], config, &clock);

        assert!(matches!(result, Err(LavaError::Timeout(_))));
        assert_eq!(fetches, 0);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn test_wait_propagates_fetch_errors() {
        let clock = MockClock::new();
        let config = WaitConfig::default();
        let fetches = RefCell::new(0usize);

        let controller =
            WaitController::new(config, &clock, ProgressReporter::new(Vec::new(), true));
        let result: Result<TestSnapshot, _> = block_on(controller.run(|| {
            *fetches.borrow_mut() += 1;
            async { Err(LavaError::Request("connection refused".to_string())) }
        }));

        match result {
            Err(LavaError::Request(msg)) => assert_eq!(msg, "connection refused"),
            other => panic!("expected Request, got {:?}", other),
        }
        assert_eq!(*fetches.borrow(), 1);
        assert_eq!(clock.sleep_count(), 0);
    }

    #[test]
    fn test_reporter_silent_writes_nothing() {
        let mut out = Vec::new();
        {
            let mut reporter = ProgressReporter::new(&mut out, true);
            reporter.on_snapshot("abc", "BUILDING", 0.0);
            reporter.on_snapshot("abc", "CONFIGURING", 0.5);
            reporter.on_snapshot("abc", "ACTIVE", 1.0);
        }
        assert!(out.is_empty());
    }

    #[test]
    fn test_reporter_banner_appears_once() {
        let mut out = Vec::new();
        {
            let mut reporter = ProgressReporter::new(&mut out, false);
            reporter.on_snapshot("abc", "BUILDING", 0.0);
            reporter.on_snapshot("abc", "BUILDING", 0.5);
            reporter.on_snapshot("abc", "CONFIGURING", 1.0);
        }
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.matches("Waiting for cluster abc").count(), 1);
        assert!(text.contains("Status: BUILDING (Elapsed time: 0.0 minutes)"));
        assert!(text.contains("Status: CONFIGURING (Elapsed time: 1.0 minutes)"));
    }

    #[test]
    fn test_reporter_overwrites_previous_line() {
        let mut out = Vec::new();
        {
            let mut reporter = ProgressReporter::new(&mut out, false);
            reporter.on_snapshot("abc", "BUILDING", 0.0);
            reporter.on_snapshot("abc", "BUILDING", 0.5);
        }
        let text = String::from_utf8(out).unwrap();
        let first = "Status: BUILDING (Elapsed time: 0.0 minutes)";
        let backspaces: String = "\u{8}".repeat(first.len());
        assert!(text.contains(&backspaces));
    }

    #[test]
    fn test_reporter_closes_region_on_active() {
        let mut out = Vec::new();
        {
            let mut reporter = ProgressReporter::new(&mut out, false);
            reporter.on_snapshot("abc", "BUILDING", 0.0);
            reporter.on_snapshot("abc", "ACTIVE", 1.0);
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.ends_with("\n\n"));
    }
}
