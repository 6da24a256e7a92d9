use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use super::sampling_stats::StatsSnapshot;

/// Cross-cutting logger for sampling loop events.
///
/// Lets the CLI, tests and any embedding front end observe cycle timing
/// without the loop knowing where the output goes.
pub trait CycleLogger: Send {
    /// Record how long a named cycle stage took.
    fn timing(&mut self, stage: &str, duration_ms: f64);

    /// Record a point-in-time metric (e.g. faces in frame).
    fn metric(&mut self, name: &str, value: f64);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-loop summary. Default: no-op.
    fn summary(&self, _stats: &StatsSnapshot) {}
}

/// Silent logger that discards all events.
pub struct NullCycleLogger;

impl CycleLogger for NullCycleLogger {
    fn timing(&mut self, _stage: &str, _duration_ms: f64) {}
    fn metric(&mut self, _name: &str, _value: f64) {}
    fn info(&mut self, _message: &str) {}
}

/// Running count, sum and maximum of one timing or metric.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub count: u64,
    pub sum: f64,
    pub max: f64,
}

impl Aggregate {
    fn record(&mut self, value: f64) {
        self.max = if self.count == 0 {
            value
        } else {
            self.max.max(value)
        };
        self.count += 1;
        self.sum += value;
    }

    pub fn mean(&self) -> f64 {
        self.sum / self.count.max(1) as f64
    }
}

/// Most recent status messages kept for inspection.
const MAX_MESSAGES: usize = 32;

/// Aggregates stage timings and metrics, reporting through the `log` crate.
///
/// Storage does not grow with the number of cycles: each key keeps only a
/// running [`Aggregate`].
pub struct LogCycleLogger {
    timings: HashMap<String, Aggregate>,
    metrics: HashMap<String, Aggregate>,
    start_time: Instant,
    messages: VecDeque<String>,
}

impl LogCycleLogger {
    pub fn new() -> Self {
        Self {
            timings: HashMap::new(),
            metrics: HashMap::new(),
            start_time: Instant::now(),
            messages: VecDeque::with_capacity(MAX_MESSAGES),
        }
    }

    /// Returns the formatted summary, or `None` if no cycle ever ran.
    pub fn summary_string(&self, stats: &StatsSnapshot) -> Option<String> {
        if stats.ticks_admitted == 0 && self.timings.is_empty() {
            return None;
        }

        let elapsed_s = self.start_time.elapsed().as_secs_f64();
        let mut lines = vec![format!(
            "Sampling summary ({} cycles published, {elapsed_s:.1}s):",
            stats.cycles_published
        )];
        lines.push(format!(
            "  ticks: {} admitted, {} dropped busy, {} dropped not ready",
            stats.ticks_admitted, stats.ticks_dropped_busy, stats.ticks_dropped_not_ready
        ));
        lines.push(format!(
            "  cycles: {} frames not ready, {} failed, {} discarded",
            stats.frames_not_ready, stats.cycle_failures, stats.cycles_discarded
        ));

        let mut stages: Vec<_> = self.timings.iter().collect();
        stages.sort_by(|a, b| a.0.cmp(b.0));
        for (stage, agg) in stages {
            lines.push(format!(
                "  {stage:8}: avg {:6.1}ms  max {:6.1}ms",
                agg.mean(),
                agg.max
            ));
        }

        let mut names: Vec<_> = self.metrics.iter().collect();
        names.sort_by(|a, b| a.0.cmp(b.0));
        for (name, agg) in names {
            lines.push(format!("  {name}: avg {:.1}", agg.mean()));
        }

        if stats.cycles_published > 0 && elapsed_s > 0.0 {
            let rate = stats.cycles_published as f64 / elapsed_s;
            lines.push(format!("  Rate: {rate:.1} cycles/s"));
        }

        Some(lines.join("\n"))
    }

    pub fn timings_for(&self, stage: &str) -> Option<Aggregate> {
        self.timings.get(stage).copied()
    }

    pub fn metrics_for(&self, name: &str) -> Option<Aggregate> {
        self.metrics.get(name).copied()
    }

    /// Number of distinct timing and metric keys held.
    pub fn tracked_keys(&self) -> usize {
        self.timings.len() + self.metrics.len()
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.messages.iter().map(String::as_str)
    }
}

impl Default for LogCycleLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleLogger for LogCycleLogger {
    fn timing(&mut self, stage: &str, duration_ms: f64) {
        record(&mut self.timings, stage, duration_ms);
    }

    fn metric(&mut self, name: &str, value: f64) {
        record(&mut self.metrics, name, value);
    }

    fn info(&mut self, message: &str) {
        if self.messages.len() == MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.messages.push_back(message.to_string());
        log::info!("{message}");
    }

    fn summary(&self, stats: &StatsSnapshot) {
        if let Some(text) = self.summary_string(stats) {
            log::info!("\n\n{text}");
        }
    }
}

fn record(map: &mut HashMap<String, Aggregate>, key: &str, value: f64) {
    match map.get_mut(key) {
        Some(agg) => agg.record(value),
        None => {
            let mut agg = Aggregate::default();
            agg.record(value);
            map.insert(key.to_string(), agg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn stats(published: u64) -> StatsSnapshot {
        StatsSnapshot {
            ticks_admitted: published + 1,
            ticks_dropped_busy: 4,
            cycles_published: published,
            cycle_failures: 1,
            ..StatsSnapshot::default()
        }
    }

    #[test]
    fn test_null_logger_all_methods_are_noop() {
        let mut logger = NullCycleLogger;
        logger.timing("detect", 5.0);
        logger.metric("faces", 1.0);
        logger.info("hello");
        logger.summary(&StatsSnapshot::default());
    }

    #[test]
    fn test_timing_records_values() {
        let mut logger = LogCycleLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 30.0);
        logger.timing("rank", 0.1);

        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.count, 2);
        assert_relative_eq!(detect.mean(), 25.0);
        assert_relative_eq!(detect.max, 30.0);
        assert_eq!(logger.timings_for("rank").unwrap().count, 1);
        assert!(logger.timings_for("capture").is_none());
    }

    #[test]
    fn test_metric_records_values() {
        let mut logger = LogCycleLogger::new();
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);
        let faces = logger.metrics_for("faces").unwrap();
        assert_eq!(faces.count, 2);
        assert_relative_eq!(faces.sum, 3.0);
    }

    #[test]
    fn test_summary_includes_counters_and_stages() {
        let mut logger = LogCycleLogger::new();
        logger.timing("detect", 20.0);
        logger.timing("detect", 40.0);
        logger.metric("faces", 1.0);
        logger.metric("faces", 2.0);

        let summary = logger.summary_string(&stats(10)).unwrap();
        assert!(summary.contains("10 cycles published"));
        assert!(summary.contains("4 dropped busy"));
        assert!(summary.contains("1 failed"));
        assert!(summary.contains("detect"));
        assert!(summary.contains("avg   30.0ms"));
        assert!(summary.contains("faces: avg 1.5"));
    }

    #[test]
    fn test_empty_summary_returns_none() {
        let logger = LogCycleLogger::new();
        assert!(logger.summary_string(&StatsSnapshot::default()).is_none());
    }

    #[test]
    fn test_info_stores_messages() {
        let mut logger = LogCycleLogger::new();
        logger.info("models ready");
        assert_eq!(logger.messages().collect::<Vec<_>>(), vec!["models ready"]);
    }

    #[test]
    fn test_storage_stays_constant_over_long_runs() {
        let mut logger = LogCycleLogger::new();
        for i in 0..100_000 {
            logger.timing("detect", (i % 50) as f64);
            logger.timing("rank", 0.1);
            logger.metric("faces", (i % 2) as f64);
        }
        for i in 0..(MAX_MESSAGES * 3) {
            logger.info(&format!("message {i}"));
        }

        assert_eq!(logger.tracked_keys(), 3);
        assert_eq!(logger.messages().count(), MAX_MESSAGES);
        assert_eq!(
            logger.messages().last(),
            Some(format!("message {}", MAX_MESSAGES * 3 - 1).as_str())
        );
        let detect = logger.timings_for("detect").unwrap();
        assert_eq!(detect.count, 100_000);
        assert_relative_eq!(detect.max, 49.0);
        assert_relative_eq!(logger.metrics_for("faces").unwrap().mean(), 0.5);
    }

    #[test]
    fn test_aggregate_max_handles_negative_first_value() {
        let mut agg = Aggregate::default();
        agg.record(-3.0);
        agg.record(-5.0);
        assert_relative_eq!(agg.max, -3.0);
    }
}
