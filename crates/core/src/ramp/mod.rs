//! Cancellable fade loop.
//!
//! [`PeriodicRamp`] walks the intensity up from 0 to 1 and back down in
//! `steps` discrete increments, pushing `base × intensity` to every target on
//! each step and pausing for the update interval in between. It runs until
//! the [`ShutdownSignal`] it is bound to is raised; the flag is checked before
//! every step, so cancellation takes effect after at most one in-flight step.

use std::{thread, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    lighting::{ColorWriter, Target, TargetSink},
    LightControlError, Result, ShutdownSignal,
};

/// Timing of one fade: a half-cycle lasts `cycle_duration` and is split into
/// steps of `update_interval`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RampConfig {
    #[serde(rename = "cycle_ms", with = "millis")]
    pub cycle_duration: Duration,
    #[serde(rename = "interval_ms", with = "millis")]
    pub update_interval: Duration,
}

impl Default for RampConfig {
    fn default() -> Self {
        Self {
            cycle_duration: Duration::from_millis(1000),
            update_interval: Duration::from_millis(20),
        }
    }
}

impl RampConfig {
    pub fn new(cycle_duration: Duration, update_interval: Duration) -> Self {
        Self {
            cycle_duration,
            update_interval,
        }
    }

    pub fn from_millis(cycle_ms: u64, interval_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(cycle_ms),
            Duration::from_millis(interval_ms),
        )
    }

    /// Number of steps per half-cycle.
    ///
    /// The cycle must be a positive, exact multiple of the interval.
    pub fn steps(&self) -> Result<u32> {
        let cycle = self.cycle_duration.as_nanos();
        let interval = self.update_interval.as_nanos();
        if interval == 0 {
            return Err(LightControlError::config("update interval must be non-zero"));
        }
        if cycle % interval != 0 {
            return Err(LightControlError::config(format!(
                "cycle of {:?} is not a multiple of the {:?} update interval",
                self.cycle_duration, self.update_interval
            )));
        }
        match u32::try_from(cycle / interval) {
            Ok(0) => Err(LightControlError::config(format!(
                "cycle of {:?} yields no steps",
                self.cycle_duration
            ))),
            Ok(steps) => Ok(steps),
            Err(_) => Err(LightControlError::config(format!(
                "cycle of {:?} yields too many steps",
                self.cycle_duration
            ))),
        }
    }
}

/// Fraction of full brightness at `step` of `steps`.
///
/// Exact at both ends: `intensity(0, n) == 0.0` and `intensity(n, n) == 1.0`.
pub fn intensity(step: u32, steps: u32) -> f64 {
    f64::from(step) / f64::from(steps)
}

/// Where the ramp currently is in its up/down traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RampPhase {
    #[default]
    Idle,
    RampingUp,
    RampingDown,
    Cancelled,
}

/// Summary returned once the ramp stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RampReport {
    /// Full up-then-down traversals completed.
    pub cycles_completed: u64,
    /// Steps whose colors reached every target.
    pub steps_applied: u64,
    pub phase: RampPhase,
}

impl RampReport {
    pub fn was_cancelled(&self) -> bool {
        self.phase == RampPhase::Cancelled
    }
}

/// Suspends the ramp between steps.
pub trait Pacer {
    fn pause(&mut self, interval: Duration);
}

/// Pacer that blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&mut self, interval: Duration) {
        thread::sleep(interval);
    }
}

impl<F: FnMut(Duration)> Pacer for F {
    fn pause(&mut self, interval: Duration) {
        self(interval)
    }
}

/// Up/down fade loop bound to a shutdown signal.
#[derive(Debug)]
pub struct PeriodicRamp<P = ThreadPacer> {
    signal: ShutdownSignal,
    pacer: P,
}

impl PeriodicRamp {
    pub fn new(signal: ShutdownSignal) -> Self {
        Self {
            signal,
            pacer: ThreadPacer,
        }
    }
}

impl<P: Pacer> PeriodicRamp<P> {
    /// Replaces the pacer used between steps.
    pub fn with_pacer<Q: Pacer>(self, pacer: Q) -> PeriodicRamp<Q> {
        PeriodicRamp {
            signal: self.signal,
            pacer,
        }
    }

    pub fn signal(&self) -> &ShutdownSignal {
        &self.signal
    }

    /// Fades `targets` up and down through `sink` until shutdown is requested.
    ///
    /// Fails before touching the sink when the config yields no steps or
    /// `targets` is empty. A sink failure ends the loop and is returned as is;
    /// tearing down the effect stays with the caller either way.
    pub fn run<S>(&mut self, config: &RampConfig, targets: &[Target], sink: &S) -> Result<RampReport>
    where
        S: TargetSink + ?Sized,
    {
        self.drive(config, targets, sink, None)
    }

    /// Same as [`PeriodicRamp::run`], but also stops after `max_cycles` full
    /// cycles.
    pub fn run_cycles<S>(
        &mut self,
        config: &RampConfig,
        targets: &[Target],
        sink: &S,
        max_cycles: u64,
    ) -> Result<RampReport>
    where
        S: TargetSink + ?Sized,
    {
        self.drive(config, targets, sink, Some(max_cycles))
    }

    fn drive<S>(
        &mut self,
        config: &RampConfig,
        targets: &[Target],
        sink: &S,
        max_cycles: Option<u64>,
    ) -> Result<RampReport>
    where
        S: TargetSink + ?Sized,
    {
        let steps = config.steps()?;
        if targets.is_empty() {
            return Err(LightControlError::config("ramp needs at least one target"));
        }

        tracing::debug!(
            steps,
            interval = ?config.update_interval,
            targets = targets.len(),
            "starting ramp"
        );

        let mut report = RampReport::default();
        'cycles: loop {
            if max_cycles.is_some_and(|max| report.cycles_completed >= max) {
                report.phase = RampPhase::Idle;
                break;
            }

            report.phase = RampPhase::RampingUp;
            tracing::debug!(cycle = report.cycles_completed, "ramping up");
            for step in 0..=steps {
                if !self.step(step, steps, config, targets, sink, &mut report)? {
                    break 'cycles;
                }
            }

            report.phase = RampPhase::RampingDown;
            tracing::debug!(cycle = report.cycles_completed, "ramping down");
            for step in (0..=steps).rev() {
                if !self.step(step, steps, config, targets, sink, &mut report)? {
                    break 'cycles;
                }
            }

            report.cycles_completed += 1;
        }

        tracing::debug!(
            cycles = report.cycles_completed,
            steps = report.steps_applied,
            phase = ?report.phase,
            "ramp stopped"
        );
        Ok(report)
    }

    /// Applies one step to every target, then pauses. Returns `false` without
    /// touching the sink once shutdown has been requested.
    fn step<S>(
        &mut self,
        step: u32,
        steps: u32,
        config: &RampConfig,
        targets: &[Target],
        sink: &S,
        report: &mut RampReport,
    ) -> Result<bool>
    where
        S: TargetSink + ?Sized,
    {
        if self.signal.is_shutdown_requested() {
            report.phase = RampPhase::Cancelled;
            return Ok(false);
        }

        let level = intensity(step, steps);
        {
            let mut writer = sink.lock()?;
            for target in targets {
                writer.set_color(target.id, target.base_color.scaled(level))?;
            }
        }
        tracing::trace!(step, intensity = level, "applied step");
        report.steps_applied += 1;

        self.pacer.pause(config.update_interval);
        Ok(true)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Instant,
    };

    use super::*;
    use crate::{
        lighting::{RecordingSink, TargetId},
        Color,
    };

    fn white(id: u16) -> Target {
        Target::new(TargetId(id), Color::WHITE)
    }

    fn instant_ramp(signal: &ShutdownSignal) -> PeriodicRamp<impl Pacer> {
        PeriodicRamp::new(signal.clone()).with_pacer(|_: Duration| {})
    }

    fn intensities(sink: &RecordingSink) -> Vec<f64> {
        sink.applied().iter().map(|applied| applied.color.r).collect()
    }

    #[test]
    fn intensity_is_exact_at_endpoints() {
        for steps in [1, 3, 7, 50, 1000] {
            assert_eq!(intensity(0, steps), 0.0);
            assert_eq!(intensity(steps, steps), 1.0);
        }
        assert_eq!(intensity(25, 50), 0.5);
    }

    #[test]
    fn steps_divide_cycle_by_interval() {
        assert_eq!(RampConfig::default().steps().unwrap(), 50);
        assert_eq!(RampConfig::from_millis(20, 20).steps().unwrap(), 1);
    }

    #[test]
    fn rejects_degenerate_configs() {
        for config in [
            RampConfig::from_millis(1000, 0),
            RampConfig::from_millis(0, 20),
            RampConfig::from_millis(10, 20),
            RampConfig::from_millis(1000, 30),
        ] {
            assert!(config.steps().unwrap_err().is_configuration(), "{config:?}");
        }
    }

    #[test]
    fn zero_steps_fails_without_applying() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let err = instant_ramp(&signal)
            .run(&RampConfig::from_millis(10, 20), &[white(1)], &sink)
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(sink.batches(), 0);
    }

    #[test]
    fn empty_targets_fail_without_applying() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let err = instant_ramp(&signal)
            .run(&RampConfig::default(), &[], &sink)
            .unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(sink.batches(), 0);
    }

    #[test]
    fn full_cycle_goes_up_then_down() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let config = RampConfig::default();

        let report = instant_ramp(&signal)
            .run_cycles(&config, &[white(1)], &sink, 1)
            .unwrap();

        let mut expected: Vec<f64> = (0..=50).map(|step| f64::from(step) / 50.0).collect();
        expected.extend((0..=50).rev().map(|step| f64::from(step) / 50.0));

        assert_eq!(intensities(&sink), expected);
        assert_eq!(sink.applied().len(), 2 * (50 + 1));
        assert_eq!(report.cycles_completed, 1);
        assert_eq!(report.steps_applied, 102);
        assert!(!report.was_cancelled());
    }

    #[test]
    fn half_cycles_are_monotonic() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let config = RampConfig::from_millis(70, 10);

        instant_ramp(&signal)
            .run_cycles(&config, &[white(1)], &sink, 2)
            .unwrap();

        let values = intensities(&sink);
        let half = 7 + 1;
        assert_eq!(values.len(), 4 * half);
        for chunk in values.chunks(half).step_by(2) {
            assert!(chunk.windows(2).all(|pair| pair[0] <= pair[1]));
        }
        for chunk in values.chunks(half).skip(1).step_by(2) {
            assert!(chunk.windows(2).all(|pair| pair[0] >= pair[1]));
        }
    }

    #[test]
    fn scales_base_color() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let target = Target::new(TargetId(9), Color::new(1.0, 0.5, 0.0));

        instant_ramp(&signal)
            .run_cycles(&RampConfig::from_millis(40, 20), &[target], &sink, 1)
            .unwrap();

        let colors: Vec<Color> = sink.applied().iter().map(|applied| applied.color).collect();
        assert_eq!(colors[1], Color::new(0.5, 0.25, 0.0));
        assert_eq!(colors[2], Color::new(1.0, 0.5, 0.0));
    }

    #[test]
    fn stops_within_one_step_of_shutdown() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new().request_shutdown_after(10, signal.clone());

        let report = instant_ramp(&signal)
            .run(&RampConfig::default(), &[white(1)], &sink)
            .unwrap();

        let applied = sink.applied().len();
        assert!(applied <= 11, "applied {applied} colors after shutdown");
        assert_eq!(applied, 10);
        assert!(report.was_cancelled());
        assert_eq!(report.cycles_completed, 0);
    }

    #[test]
    fn already_requested_shutdown_applies_nothing() {
        let signal = ShutdownSignal::new();
        signal.request_shutdown();
        let sink = RecordingSink::new();

        let report = instant_ramp(&signal)
            .run(&RampConfig::default(), &[white(1)], &sink)
            .unwrap();

        assert_eq!(sink.batches(), 0);
        assert_eq!(report.phase, RampPhase::Cancelled);
    }

    #[test]
    fn every_step_reaches_all_targets_before_advancing() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();

        instant_ramp(&signal)
            .run_cycles(&RampConfig::from_millis(100, 20), &[white(1), white(2)], &sink, 1)
            .unwrap();

        let applied = sink.applied();
        assert_eq!(applied.len(), 2 * 2 * (5 + 1));
        for pair in applied.chunks(2) {
            assert_eq!(pair[0].batch, pair[1].batch);
            assert_eq!(pair[0].id, TargetId(1));
            assert_eq!(pair[1].id, TargetId(2));
            assert_eq!(pair[0].color, pair[1].color);
        }
    }

    #[test]
    fn lock_is_released_before_pausing() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let mut pauses = Vec::new();

        PeriodicRamp::new(signal.clone())
            .with_pacer(|interval: Duration| pauses.push((interval, sink.is_locked())))
            .run_cycles(&RampConfig::from_millis(60, 20), &[white(1)], &sink, 1)
            .unwrap();

        assert_eq!(pauses.len(), 8);
        assert!(pauses
            .iter()
            .all(|(interval, locked)| *interval == Duration::from_millis(20) && !locked));
    }

    #[test]
    fn sink_failure_is_returned_immediately() {
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new().fail_on_batch(4);

        let err = instant_ramp(&signal)
            .run(&RampConfig::default(), &[white(1)], &sink)
            .unwrap_err();

        assert!(matches!(err, LightControlError::SinkUnavailable(_)));
        assert_eq!(sink.applied().len(), 3);
        assert!(!sink.is_locked());
    }

    #[test]
    fn cancellation_from_another_thread_stops_the_ramp() {
        let interval = Duration::from_millis(5);
        let signal = ShutdownSignal::new();
        let sink = RecordingSink::new();
        let writer = signal.clone();
        let raised_at = Arc::new(Mutex::new(None));
        let raised = Arc::clone(&raised_at);

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(30));
            let mut raised = raised.lock().unwrap();
            writer.request_shutdown();
            *raised = Some(Instant::now());
        });

        let mut late_pauses = 0;
        let report = PeriodicRamp::new(signal.clone())
            .with_pacer(|pause: Duration| {
                if signal.is_shutdown_requested() {
                    late_pauses += 1;
                }
                std::thread::sleep(pause);
            })
            .run(&RampConfig::from_millis(10, 5), &[white(1)], &sink)
            .unwrap();
        let returned_at = Instant::now();
        handle.join().unwrap();

        assert!(report.was_cancelled());
        assert!(late_pauses <= 1, "paused {late_pauses} times after shutdown");
        let raised_at = raised_at.lock().unwrap().unwrap();
        let latency = returned_at.saturating_duration_since(raised_at);
        assert!(latency <= interval + Duration::from_millis(100), "took {latency:?}");

        let applied = sink.applied().len();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(sink.applied().len(), applied);
    }

    #[test]
    fn config_round_trips_through_json_in_millis() {
        let config: RampConfig =
            serde_json::from_str(r#"{"cycle_ms": 2000, "interval_ms": 40}"#).unwrap();
        assert_eq!(config, RampConfig::from_millis(2000, 40));
        assert_eq!(config.steps().unwrap(), 50);
    }
}
