use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use rstest::rstest;
use thermo_core::mocks::{
    FailingPersister, MemoryPersister, RecordingObserver, ScriptedThermometer,
};
use thermo_core::{
    AbortReason, Phase, StabilizationConfig, StabilizationStatus, Stabilizer, ThermoError,
};
use thermo_traits::Channel;
use thermo_traits::clock::test_clock::TestClock;

const INTERVAL: Duration = Duration::from_secs(2);

fn cfg(points: usize) -> StabilizationConfig {
    StabilizationConfig {
        slope_tolerance: 0.01,
        intercept_tolerance: 0.1,
        points_per_cycle: points,
        sampling_interval: INTERVAL,
        ..Default::default()
    }
}

struct Harness {
    engine: Stabilizer,
    clock: TestClock,
    persisted: MemoryPersister,
    events: RecordingObserver,
}

fn harness(config: StabilizationConfig) -> Harness {
    let clock = TestClock::new();
    let persisted = MemoryPersister::new();
    let events = RecordingObserver::new();
    let engine = Stabilizer::builder()
        .with_config(config)
        .with_persister(persisted.clone())
        .with_setpoint(300.0)
        .with_observer(events.clone())
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("valid engine");
    Harness {
        engine,
        clock,
        persisted,
        events,
    }
}

/// Climbs 0.5 K per reading for the first `n` readings, then holds at 300 K.
fn drift_then_hold(n: usize) -> ScriptedThermometer {
    ScriptedThermometer::from_fn(move |i| {
        if i < n {
            300.0 + 0.5 * i as f64
        } else {
            300.0
        }
    })
}

#[test]
fn constant_reading_within_band_is_stable_after_one_cycle() {
    let mut h = harness(cfg(5));
    let mut dev = ScriptedThermometer::constant(300.02);

    let status = h.engine.check_stabilization(&mut dev);

    let StabilizationStatus::Stable(report) = status else {
        panic!("expected stable, got {status:?}");
    };
    assert_eq!(report.cycles, 1);
    assert!(report.fit.slope.abs() < 1e-12);
    assert!((report.fit.intercept - 300.02).abs() < 1e-9);
    assert_eq!(dev.reads(), 5);
    assert_eq!(h.engine.history().len(), 1);
    assert_eq!(h.engine.phase(), Phase::Stable);
    // one interval after every reading, nothing more
    assert_eq!(h.clock.elapsed(), INTERVAL * 5);
}

#[test]
fn drifting_cycle_is_recorded_and_retried() {
    let mut h = harness(cfg(5));
    let mut dev = drift_then_hold(5);

    let status = h.engine.check_stabilization(&mut dev);

    assert!(status.is_stable(), "{status:?}");
    let history = h.engine.history();
    assert_eq!(history.len(), 2);
    assert!((history[0].slope - 0.5).abs() < 1e-9);
    assert_eq!(history[1].measurements, vec![300.0; 5]);
    assert_eq!(h.events.count("retry"), 1);
    assert_eq!(dev.reads(), 10);
    // 10 reading intervals plus the pause before the second cycle
    assert_eq!(h.clock.elapsed(), INTERVAL * 11);
}

#[test]
fn offset_alone_fails_the_check() {
    // flat but 0.5 K away from the setpoint
    let mut h = harness(StabilizationConfig {
        max_cycles: Some(2),
        ..cfg(4)
    });
    let mut dev = ScriptedThermometer::constant(300.5);
    let status = h.engine.check_stabilization(&mut dev);
    assert_eq!(
        status,
        StabilizationStatus::Aborted(ThermoError::Abort(AbortReason::MaxCycles { max: 2 }))
    );
    assert_eq!(h.engine.history().len(), 2);
}

#[test]
fn cycle_budget_stops_without_second_cycle() {
    let mut h = harness(StabilizationConfig {
        max_cycles: Some(1),
        ..cfg(5)
    });
    let mut dev = drift_then_hold(usize::MAX);

    let status = h.engine.check_stabilization(&mut dev);

    assert_eq!(
        status,
        StabilizationStatus::Aborted(ThermoError::Abort(AbortReason::MaxCycles { max: 1 }))
    );
    assert_eq!(dev.reads(), 5);
    assert_eq!(h.engine.history().len(), 1);
    assert_eq!(h.events.count("retry"), 0);
    assert_eq!(h.engine.phase(), Phase::Aborted);
    assert_eq!(h.clock.elapsed(), INTERVAL * 5);
}

#[rstest]
#[case("socket closed", ThermoError::Communication("socket closed".into()))]
#[case("read timed out", ThermoError::Timeout)]
fn communication_failure_aborts_mid_cycle(#[case] message: &str, #[case] expected: ThermoError) {
    let mut h = harness(cfg(5));
    let mut dev = ScriptedThermometer::constant(300.0).fail_on(3, message);

    let status = h.engine.check_stabilization(&mut dev);

    assert_eq!(status, StabilizationStatus::Aborted(expected));
    assert_eq!(dev.reads(), 3);
    assert!(h.engine.history().is_empty());
    assert_eq!(h.engine.current_measurements().len(), 2);
    assert_eq!(h.events.count("retry"), 0);
    assert_eq!(h.events.count("cycle"), 0);
    assert_eq!(h.events.count("aborted"), 1);
}

#[test]
fn typed_hardware_timeout_maps_to_timeout() {
    use thermo_hardware::SimulatedController;
    let mut h = harness(cfg(5));
    let mut dev = SimulatedController::new(300.0).with_fail_after(1);
    let status = h.engine.check_stabilization(&mut dev);
    assert_eq!(status, StabilizationStatus::Aborted(ThermoError::Timeout));
}

// Non-finite readings are dropped and replaced by a fresh reading, so every
// closed cycle holds exactly `points_per_cycle` valid samples.
#[test]
fn non_finite_readings_are_resampled_not_counted() {
    let mut h = harness(cfg(4));
    let mut dev = ScriptedThermometer::new(vec![
        300.0,
        f64::NAN,
        300.0,
        f64::INFINITY,
        300.0,
        300.0,
    ]);

    let status = h.engine.check_stabilization(&mut dev);

    assert!(status.is_stable(), "{status:?}");
    assert_eq!(dev.reads(), 6);
    assert_eq!(h.engine.history()[0].measurements, vec![300.0; 4]);
    assert_eq!(h.events.count("rejected"), 2);
    // invalid readings still pace the device
    assert_eq!(h.clock.elapsed(), INTERVAL * 6);
}

#[test]
fn invalid_streak_limit_aborts() {
    let mut h = harness(StabilizationConfig {
        max_invalid_streak: Some(3),
        ..cfg(4)
    });
    let mut dev = ScriptedThermometer::new(vec![300.0, f64::NAN, f64::NAN, f64::NAN]);
    let status = h.engine.check_stabilization(&mut dev);
    assert_eq!(
        status,
        StabilizationStatus::Aborted(ThermoError::Abort(AbortReason::InvalidSamples {
            streak: 3
        }))
    );
    assert_eq!(dev.reads(), 4);
}

#[test]
fn dead_sensor_aborts_without_explicit_streak_limit() {
    let mut h = harness(StabilizationConfig {
        max_cycles: Some(1),
        ..cfg(3)
    });
    let mut dev = ScriptedThermometer::constant(f64::NAN);
    let status = h.engine.check_stabilization(&mut dev);
    assert_eq!(
        status,
        StabilizationStatus::Aborted(ThermoError::Abort(AbortReason::InvalidSamples {
            streak: 30
        }))
    );
    assert_eq!(dev.reads(), 30);
    assert!(h.engine.history().is_empty());
}

#[test]
fn setpoint_change_clears_history_and_persists_empty_state() {
    let mut h = harness(cfg(3));
    let mut dev = drift_then_hold(3);
    assert!(h.engine.check_stabilization(&mut dev).is_stable());
    assert_eq!(h.engine.history().len(), 2);

    h.engine.set_setpoint(310.0).expect("finite setpoint");

    assert!(h.engine.history().is_empty());
    assert_eq!(h.engine.phase(), Phase::Idle);
    let last = h.persisted.last().expect("snapshot");
    assert_eq!(last["setpoint"], 310.0);
    assert_eq!(last["cycles_history"], serde_json::json!([]));
    assert_eq!(last["current_measurements"], serde_json::json!([]));
}

#[rstest]
#[case(f64::NAN)]
#[case(-5.0)]
fn unphysical_setpoint_is_rejected(#[case] kelvin: f64) {
    let mut h = harness(cfg(3));
    let err = h.engine.set_setpoint(kelvin).unwrap_err();
    assert!(matches!(err, ThermoError::Config(_)));
    assert_eq!(h.engine.setpoint(), 300.0);
}

#[test]
fn state_is_persisted_after_every_sample() {
    let mut h = harness(cfg(3));
    let mut dev = ScriptedThermometer::constant(300.0);
    assert!(h.engine.check_stabilization(&mut dev).is_stable());

    let saved = h.persisted.saved();
    // initial + one per sample + cycle close
    assert_eq!(saved.len(), 1 + 3 + 1);
    let pending: Vec<usize> = saved
        .iter()
        .map(|s| s["current_measurements"].as_array().map_or(0, Vec::len))
        .collect();
    assert_eq!(pending, vec![0, 1, 2, 3, 0]);
    let last = &saved[4];
    assert_eq!(last["tolerance_A"], 0.01);
    assert_eq!(last["tolerance_B"], 0.1);
    assert_eq!(last["cycles_history"][0]["measurements"].as_array().unwrap().len(), 3);
}

#[test]
fn persistence_failure_does_not_change_outcome() {
    let events = RecordingObserver::new();
    let mut engine = Stabilizer::builder()
        .with_config(cfg(3))
        .with_persister(FailingPersister)
        .with_setpoint(300.0)
        .with_observer(events.clone())
        .with_clock(Box::new(TestClock::new()))
        .build()
        .expect("persist failure at build is not fatal");
    let mut dev = ScriptedThermometer::constant(300.0);

    assert!(engine.check_stabilization(&mut dev).is_stable());
    assert_eq!(events.count("persist_failed"), 1 + 3 + 1);
}

#[test]
fn cancellation_stops_at_next_sample() {
    let flag = Rc::new(Cell::new(false));
    let trip = flag.clone();
    let persisted = MemoryPersister::new();
    let mut engine = Stabilizer::builder()
        .with_config(cfg(5))
        .with_persister(persisted.clone())
        .with_setpoint(300.0)
        .with_clock(Box::new(TestClock::new()))
        .with_cancel_check(move || flag.get())
        .build()
        .unwrap();
    let mut dev = ScriptedThermometer::from_fn(move |i| {
        if i == 1 {
            trip.set(true);
        }
        300.0
    });

    let status = engine.check_stabilization(&mut dev);

    assert_eq!(
        status,
        StabilizationStatus::Aborted(ThermoError::Abort(AbortReason::Cancelled))
    );
    assert_eq!(dev.reads(), 2);
    // last persisted document is complete and holds both samples
    let last = persisted.last().unwrap();
    assert_eq!(last["current_measurements"], serde_json::json!([300.0, 300.0]));
}

#[test]
fn phases_follow_the_cycle() {
    let mut h = harness(cfg(3));
    let mut dev = drift_then_hold(3);
    assert!(h.engine.check_stabilization(&mut dev).is_stable());
    let phases: Vec<String> = h
        .events
        .events()
        .into_iter()
        .filter(|e| e.starts_with("phase:"))
        .collect();
    assert_eq!(
        phases,
        vec![
            "phase:CollectingCycle",
            "phase:Evaluating",
            "phase:Retrying",
            "phase:CollectingCycle",
            "phase:Evaluating",
            "phase:Stable",
        ]
    );
}

#[test]
fn reads_the_configured_channel() {
    let clock = TestClock::new();
    let mut engine = Stabilizer::builder()
        .with_config(cfg(3))
        .with_channel(Channel::A)
        .with_persister(MemoryPersister::new())
        .with_setpoint(300.0)
        .with_clock(Box::new(clock))
        .build()
        .unwrap();
    let mut dev = ScriptedThermometer::constant(300.0);
    assert!(engine.check_stabilization(&mut dev).is_stable());
    assert!(dev.channels().iter().all(|c| *c == Channel::A));
}

#[test]
fn history_accumulates_across_checks_at_same_setpoint() {
    let mut h = harness(cfg(3));
    let mut dev = ScriptedThermometer::constant(300.0);
    assert!(h.engine.check_stabilization(&mut dev).is_stable());
    assert!(h.engine.check_stabilization(&mut dev).is_stable());
    assert_eq!(h.engine.history().len(), 2);
}
