//! An append-only log of [`TimingEvent`]s plus a running [`EventStats`] per
//! event id, serialised to CSV by [`report`].

pub mod report;

use std::collections::BTreeMap;
use std::time::Instant;

/// Identifies which pipeline stage a [`TimingEvent`] belongs to: one id per
/// pipeline stage, plus one per Latency timed iteration.
pub type EventId = &'static str;

/// One timed occurrence of a pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct TimingEvent {
    /// Which stage this event timed.
    pub event_id: EventId,
    /// Iteration number within this event id, starting at 0.
    pub iteration: u64,
    /// Number of input samples this iteration covered.
    pub input_sample_count: u64,
    /// Wall-clock nanoseconds since the run started, at stage entry.
    pub wall_start: u64,
    /// Wall-clock nanoseconds since the run started, at stage exit.
    pub wall_end: u64,
    /// Process CPU-time nanoseconds at stage entry.
    pub cpu_start: u64,
    /// Process CPU-time nanoseconds at stage exit.
    pub cpu_end: u64,
}

impl TimingEvent {
    /// Wall-clock duration of this event, in nanoseconds.
    pub fn wall_nanos(&self) -> u64 {
        self.wall_end.saturating_sub(self.wall_start)
    }
}

/// Running mean/variance for one event id, updated via Welford's online
/// algorithm so the whole event log never needs to be held in memory at
/// once.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventStats {
    count: u64,
    mean: f64,
    m2: f64,
    total: f64,
    min: f64,
    max: f64,
}

impl EventStats {
    /// A fresh, empty accumulator.
    pub fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            total: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    /// Folds one more observation in.
    pub fn new_event(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
        self.total += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Number of observations folded in.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Sum of all observations.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Arithmetic mean, or `0.0` if no observations were made.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance (Bessel-corrected), or `0.0` for fewer than 2
    /// observations.
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// Smallest observation, or `0.0` if none were made.
    pub fn min(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.min }
    }

    /// Largest observation, or `0.0` if none were made.
    pub fn max(&self) -> f64 {
        if self.count == 0 { 0.0 } else { self.max }
    }

    /// Recomputes the same statistics directly from a slice, for testing
    /// online accumulation against a two-pass batch computation.
    pub fn from_batch(values: &[f64]) -> Self {
        let mut stats = Self::new();
        for &v in values {
            stats.new_event(v);
        }
        stats
    }
}

/// Chooses the largest SI prefix that places `value` in `[1, 1000)`, so a
/// report's mean duration reads as a small human-friendly number.
pub fn si_prefix(value: f64) -> (f64, &'static str) {
    const PREFIXES: &[(f64, &str)] = &[
        (1e-12, "p"),
        (1e-9, "n"),
        (1e-6, "\u{b5}"),
        (1e-3, "m"),
        (1e0, ""),
        (1e3, "k"),
    ];
    if value == 0.0 || !value.is_finite() {
        return (value, "");
    }
    let magnitude = value.abs();
    let mut chosen = PREFIXES[0];
    for &(scale, prefix) in PREFIXES {
        if magnitude >= scale {
            chosen = (scale, prefix);
        } else {
            break;
        }
    }
    (value / chosen.0, chosen.1)
}

/// A wall/CPU clock pair sampled once at process start, so every event's
/// absolute timestamps can be stored as an offset in nanoseconds.
pub struct Clock {
    start_wall: Instant,
    start_cpu: Instant,
}

impl Clock {
    /// Starts a new clock, anchored at the current instant.
    pub fn start() -> Self {
        Self {
            start_wall: Instant::now(),
            start_cpu: Instant::now(),
        }
    }

    /// Nanoseconds elapsed since this clock started.
    ///
    /// This harness has no portable access to per-process CPU time without
    /// an extra platform-specific dependency, so CPU time is approximated by
    /// wall time; the column exists in the report schema but is filled with
    /// the same value as wall time.
    pub fn wall_nanos(&self) -> u64 {
        self.start_wall.elapsed().as_nanos() as u64
    }

    /// See [`Clock::wall_nanos`] — currently aliases it.
    pub fn cpu_nanos(&self) -> u64 {
        self.start_cpu.elapsed().as_nanos() as u64
    }
}

/// Appends [`TimingEvent`]s and folds them into a per-event-id [`EventStats`]
/// as they arrive.
#[derive(Debug, Clone, Default)]
pub struct TimingLog {
    events: Vec<TimingEvent>,
    stats: BTreeMap<EventId, EventStats>,
}

impl TimingLog {
    /// An empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one event and folds its wall duration into that event id's
    /// running stats.
    pub fn record(&mut self, event: TimingEvent) {
        self.stats.entry(event.event_id).or_insert_with(EventStats::new).new_event(event.wall_nanos() as f64);
        self.events.push(event);
    }

    /// All recorded events, in recording order.
    pub fn events(&self) -> &[TimingEvent] {
        &self.events
    }

    /// Running stats per event id, keyed in a stable (alphabetical) order.
    pub fn stats(&self) -> &BTreeMap<EventId, EventStats> {
        &self.stats
    }
}

/// A number-of-nanoseconds-to-display-unit conversion, so a report written
/// in one unit can be rescaled by a downstream consumer.
#[derive(Debug, Clone, Copy)]
pub struct TimeRatio {
    /// Numerator of the ratio (e.g. `1` for nanoseconds).
    pub numerator: u64,
    /// Denominator of the ratio (e.g. `1_000_000_000` for seconds).
    pub denominator: u64,
}

impl TimeRatio {
    /// Nanoseconds, the unit every [`TimingEvent`] field is stored in.
    pub const NANOSECONDS: TimeRatio = TimeRatio { numerator: 1, denominator: 1 };

    /// Converts `nanos` into this ratio's unit.
    pub fn convert(self, nanos: u64) -> f64 {
        (nanos as f64 * self.numerator as f64) / self.denominator as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn online_stats_match_batch_computation() {
        let values = [1.0, 2.0, 3.0, 4.5, -2.0, 100.0, 0.001];
        let online = EventStats::from_batch(&values);
        let n = values.len() as f64;
        let batch_mean = values.iter().sum::<f64>() / n;
        let batch_var =
            values.iter().map(|v| (v - batch_mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!((online.mean() - batch_mean).abs() < 1e-9);
        assert!((online.variance() - batch_var).abs() < 1e-6);
        assert_eq!(online.count(), values.len() as u64);
        assert_eq!(online.min(), -2.0);
        assert_eq!(online.max(), 100.0);
    }

    #[test]
    fn si_prefix_places_mean_in_unit_range() {
        let (value, prefix) = si_prefix(0.000_002_5);
        assert!((1.0..1000.0).contains(&value));
        assert_eq!(prefix, "\u{b5}");

        let (value, prefix) = si_prefix(2500.0);
        assert!((1.0..1000.0).contains(&value));
        assert_eq!(prefix, "k");
    }

    #[test]
    fn empty_stats_report_zeros_not_panics() {
        let stats = EventStats::new();
        assert_eq!(stats.mean(), 0.0);
        assert_eq!(stats.variance(), 0.0);
        assert_eq!(stats.min(), 0.0);
        assert_eq!(stats.max(), 0.0);
    }
}
