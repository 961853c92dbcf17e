use std::time::Duration;

use thermo_core::mocks::MemoryPersister;
use thermo_core::{
    RampParams, RecordLog, StabilizationConfig, Stabilizer, Sweep, ThermoError, go_to_temperature,
};
use rstest::rstest;
use thermo_hardware::{SimulatedController, SimulatedLockIn};
use thermo_traits::TemperatureController;
use thermo_traits::clock::test_clock::TestClock;

fn engine(points: usize) -> Stabilizer {
    Stabilizer::builder()
        .with_config(StabilizationConfig {
            slope_tolerance: 0.01,
            intercept_tolerance: 0.1,
            points_per_cycle: points,
            sampling_interval: Duration::from_secs(1),
            max_cycles: Some(3),
            ..Default::default()
        })
        .with_persister(MemoryPersister::new())
        .with_setpoint(300.0)
        .with_clock(Box::new(TestClock::new()))
        .build()
        .unwrap()
}

fn rows(path: &std::path::Path) -> Vec<Vec<String>> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|l| l.split(' ').map(str::to_string).collect())
        .collect()
}

#[test]
fn sweep_logs_one_record_per_setpoint() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data/sweep.dat");
    let mut log = RecordLog::open(&data).unwrap();
    // controller jumps straight to each new setpoint
    let mut ctrl = SimulatedController::new(300.0).with_approach(1.0);
    let mut lockin = SimulatedLockIn::new();
    let mut stab = engine(4);

    let sweep = Sweep::new(300.0, 302.0, 3).with_ramp_rate(2.0);
    let completed = sweep
        .run(&mut stab, &mut ctrl, &mut lockin, &mut log)
        .expect("sweep completes");

    assert_eq!(completed, 5);
    assert_eq!(ctrl.ramp_rate(), Some(2.0));
    assert_eq!(stab.setpoint(), 300.0);

    let rows = rows(&data);
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[0][0], "T_A[K]");
    let setpoints: Vec<&str> = rows[1..].iter().map(|r| r[2].as_str()).collect();
    assert_eq!(
        setpoints,
        vec!["300.000000", "301.000000", "302.000000", "301.000000", "300.000000"]
    );
    let counts: Vec<&str> = rows[1..].iter().map(|r| r[11].as_str()).collect();
    assert_eq!(counts, vec!["1", "2", "3", "4", "5"]);
}

#[test]
fn failed_step_aborts_the_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("sweep.dat");
    let mut log = RecordLog::open(&data).unwrap();
    // first step: 4 stabilization reads + 2 record reads, then silence
    let mut ctrl = SimulatedController::new(300.0)
        .with_approach(1.0)
        .with_fail_after(6);
    let mut lockin = SimulatedLockIn::new();
    let mut stab = engine(4);

    let err = Sweep::new(300.0, 302.0, 3)
        .run(&mut stab, &mut ctrl, &mut lockin, &mut log)
        .unwrap_err();

    assert_eq!(err.downcast_ref::<ThermoError>(), Some(&ThermoError::Timeout));
    assert_eq!(
        format!("{err}"),
        "sweep stopped at step 2/5 (301 K), 1 completed"
    );
    assert_eq!(rows(&data).len(), 2);
}

#[test]
fn go_to_logs_until_within_band() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("ramp.dat");
    let mut log = RecordLog::open(&data).unwrap();
    let mut ctrl = SimulatedController::new(290.0);
    let mut lockin = SimulatedLockIn::new();
    let clock = TestClock::new();
    let params = RampParams {
        interval: Duration::from_secs(5),
        ..Default::default()
    };

    let written = go_to_temperature(
        &mut ctrl,
        &mut lockin,
        &mut log,
        300.0,
        &params,
        &clock,
        &|| false,
    )
    .expect("reaches target");

    assert!(written >= 1);
    assert_eq!(ctrl.ramp_rate(), Some(4.0));
    assert_eq!(rows(&data).len(), written + 1);
    assert_eq!(clock.elapsed(), params.interval * written as u32);
}

#[test]
fn go_to_honours_cancellation() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = RecordLog::open(dir.path().join("ramp.dat")).unwrap();
    let mut ctrl = SimulatedController::new(290.0);
    let mut lockin = SimulatedLockIn::new();
    let err = go_to_temperature(
        &mut ctrl,
        &mut lockin,
        &mut log,
        300.0,
        &RampParams::default(),
        &TestClock::new(),
        &|| true,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ThermoError>(),
        Some(ThermoError::Abort(_))
    ));
}

#[rstest]
#[case(-5.0)]
#[case(0.0)]
#[case(f64::NAN)]
fn go_to_rejects_bad_ramp_rate_before_touching_the_controller(#[case] rate: f64) {
    let dir = tempfile::tempdir().unwrap();
    let mut log = RecordLog::open(dir.path().join("ramp.dat")).unwrap();
    let mut ctrl = SimulatedController::new(290.0);
    let mut lockin = SimulatedLockIn::new();
    let params = RampParams {
        ramp_rate_k_per_min: rate,
        ..Default::default()
    };
    let err = go_to_temperature(
        &mut ctrl,
        &mut lockin,
        &mut log,
        300.0,
        &params,
        &TestClock::new(),
        &|| false,
    )
    .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ThermoError>(),
        Some(ThermoError::Config(_))
    ));
    assert_eq!(ctrl.ramp_rate(), None);
    assert_eq!(ctrl.setpoint().unwrap(), 290.0);
    assert_eq!(ctrl.reads(), 0);
}

#[test]
fn go_to_rejects_non_physical_target() {
    let dir = tempfile::tempdir().unwrap();
    let mut log = RecordLog::open(dir.path().join("ramp.dat")).unwrap();
    let mut ctrl = SimulatedController::new(290.0);
    let err = go_to_temperature(
        &mut ctrl,
        &mut SimulatedLockIn::new(),
        &mut log,
        -10.0,
        &RampParams::default(),
        &TestClock::new(),
        &|| false,
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ThermoError>(),
        Some(ThermoError::Config(_))
    ));
    assert_eq!(ctrl.ramp_rate(), None);
}

#[rstest]
#[case(Sweep::new(300.0, 302.0, 3).with_ramp_rate(-5.0))]
#[case(Sweep::new(-10.0, 302.0, 3))]
#[case(Sweep::new(300.0, f64::NAN, 3))]
fn sweep_validates_plan_before_driving_the_controller(#[case] sweep: Sweep) {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("sweep.dat");
    let mut log = RecordLog::open(&data).unwrap();
    let mut ctrl = SimulatedController::new(290.0);
    let mut lockin = SimulatedLockIn::new();
    let mut stab = engine(4);

    let err = sweep
        .run(&mut stab, &mut ctrl, &mut lockin, &mut log)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ThermoError>(),
        Some(ThermoError::Config(_))
    ));
    assert_eq!(ctrl.ramp_rate(), None);
    assert_eq!(ctrl.setpoint().unwrap(), 290.0);
    assert_eq!(stab.setpoint(), 300.0);
    assert_eq!(rows(&data).len(), 1);
}
