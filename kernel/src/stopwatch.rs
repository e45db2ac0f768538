// Stopwatch
//
// Measures one start/stop interval on the monotonic clock.
// Independent of the log.

use std::time::{Duration, Instant};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StopwatchError {
    #[error("stopwatch is already running; stop it before starting again")]
    AlreadyRunning,

    #[error("stopwatch is not running; start it before stopping")]
    NotRunning,

    #[error("no completed measurement; start and stop the stopwatch first")]
    NotStopped,
}

#[derive(Debug, Default, Clone)]
pub struct Stopwatch {
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.started = None;
        self.stopped = None;
    }

    pub fn start(&mut self) -> Result<(), StopwatchError> {
        if self.started.is_some() {
            return Err(StopwatchError::AlreadyRunning);
        }
        self.started = Some(Instant::now());
        Ok(())
    }

    pub fn stop(&mut self) -> Result<(), StopwatchError> {
        if self.started.is_none() {
            return Err(StopwatchError::NotRunning);
        }
        self.stopped = Some(Instant::now());
        Ok(())
    }

    /// Length of the completed interval. Resets the stopwatch.
    pub fn elapsed(&mut self) -> Result<Duration, StopwatchError> {
        match (self.started, self.stopped) {
            (Some(started), Some(stopped)) => {
                self.reset();
                Ok(stopped.saturating_duration_since(started))
            }
            _ => Err(StopwatchError::NotStopped),
        }
    }

    /// Like [`Stopwatch::elapsed`], formatted as `HH:MM:SS`.
    pub fn elapsed_hms(&mut self) -> Result<String, StopwatchError> {
        self.elapsed().map(format_hms)
    }
}

/// Whole seconds as `HH:MM:SS`. Hours grow past 24 rather than wrapping.
pub fn format_hms(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_stop_elapsed_cycle() {
        let mut sw = Stopwatch::new();
        sw.start().unwrap();
        sw.stop().unwrap();

        assert_eq!(sw.elapsed_hms().unwrap(), "00:00:00");
        // measurement is consumed
        assert_eq!(sw.elapsed(), Err(StopwatchError::NotStopped));
        sw.start().unwrap();
    }

    #[test]
    fn misuse_is_reported() {
        let mut sw = Stopwatch::new();
        assert_eq!(sw.stop(), Err(StopwatchError::NotRunning));
        assert_eq!(sw.elapsed(), Err(StopwatchError::NotStopped));

        sw.start().unwrap();
        assert_eq!(sw.start(), Err(StopwatchError::AlreadyRunning));
        assert_eq!(sw.elapsed(), Err(StopwatchError::NotStopped));

        sw.reset();
        sw.start().unwrap();
    }

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_hms(Duration::from_secs(3_725)), "01:02:05");
        assert_eq!(format_hms(Duration::from_millis(59_999)), "00:00:59");
        assert_eq!(format_hms(Duration::from_secs(90_000)), "25:00:00");
    }
}
