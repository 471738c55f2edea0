//! Named wall-clock timers for the harness.

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::Instant;

#[derive(Default)]
struct TimerState {
    starts: BTreeMap<String, Instant>,
    stops: BTreeMap<String, Instant>,
    timings: BTreeMap<String, Vec<f64>>,
}

/// Start/stop pairs by name, turned into millisecond runs on demand.
#[derive(Default)]
pub struct Timer {
    state: Mutex<TimerState>,
}

impl Timer {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of timer `name`, replacing any earlier start.
    pub fn start(&self, name: &str) {
        self.state.lock().starts.insert(name.to_string(), Instant::now());
    }

    /// Mark the end of timer `name`.
    pub fn stop(&self, name: &str) {
        self.state.lock().stops.insert(name.to_string(), Instant::now());
    }

    /// Record one run for every name that has both a start and a stop.
    pub fn calculate_and_record_all(&self) {
        let mut state = self.state.lock();
        let TimerState {
            starts,
            stops,
            timings,
        } = &mut *state;
        for (name, start) in starts.iter() {
            if let Some(stop) = stops.get(name) {
                let ms = stop.saturating_duration_since(*start).as_secs_f64() * 1000.0;
                timings.entry(name.clone()).or_default().push(ms);
            }
        }
    }

    /// Append a run of `ms` milliseconds to timer `name`.
    pub fn record(&self, name: &str, ms: f64) {
        self.state
            .lock()
            .timings
            .entry(name.to_string())
            .or_default()
            .push(ms);
    }

    /// Recorded runs by timer name, in name order.
    pub fn timings(&self) -> BTreeMap<String, Vec<f64>> {
        self.state.lock().timings.clone()
    }

    /// Forget all starts, stops and recorded runs.
    pub fn clear(&self) {
        *self.state.lock() = TimerState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_stopped_timers_recorded() {
        let timer = Timer::new();
        timer.start("a");
        timer.start("b");
        timer.stop("a");
        timer.calculate_and_record_all();
        timer.record("c", 1.5);

        let timings = timer.timings();
        assert_eq!(timings.len(), 2);
        assert_eq!(timings["a"].len(), 1);
        assert!(timings["a"][0] >= 0.0);
        assert_eq!(timings["c"], vec![1.5]);

        timer.clear();
        assert!(timer.timings().is_empty());
    }
}
