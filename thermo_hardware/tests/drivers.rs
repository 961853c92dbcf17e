use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use rstest::rstest;
use thermo_hardware::error::{HwError, Result};
use thermo_hardware::{Lakeshore331, Link, Session, Sr860};
use thermo_traits::{Channel, LockIn, TemperatureController, Thermometer};

/// Link that replays canned replies and records every line written.
#[derive(Clone, Default)]
struct ScriptedLink {
    replies: Rc<RefCell<VecDeque<String>>>,
    written: Rc<RefCell<Vec<String>>>,
}

impl ScriptedLink {
    fn with_replies(replies: &[&str]) -> Self {
        let link = Self::default();
        link.replies
            .borrow_mut()
            .extend(replies.iter().map(|s| s.to_string()));
        link
    }

    fn written(&self) -> Vec<String> {
        self.written.borrow().clone()
    }
}

impl Link for ScriptedLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        self.written.borrow_mut().push(line.to_string());
        Ok(())
    }
    fn read_line(&mut self) -> Result<String> {
        self.replies.borrow_mut().pop_front().ok_or(HwError::Timeout)
    }
}

fn lakeshore(link: &ScriptedLink) -> Lakeshore331<ScriptedLink> {
    Lakeshore331::new(Session::new(link.clone(), Duration::ZERO))
}

#[rstest]
#[case(Channel::A, "KRDG? A")]
#[case(Channel::B, "KRDG? B")]
fn reads_requested_channel(#[case] channel: Channel, #[case] command: &str) {
    let link = ScriptedLink::with_replies(&["+300.125"]);
    let mut ls = lakeshore(&link);
    let t = ls.read_temperature(channel).expect("reading");
    assert!((t - 300.125).abs() < 1e-12);
    assert_eq!(link.written(), vec![command.to_string()]);
}

#[test]
fn setpoint_and_ramp_commands_target_loop_one() {
    let link = ScriptedLink::with_replies(&["+310.000", "45.2"]);
    let mut ls = lakeshore(&link);
    ls.set_ramp_rate(4.0).unwrap();
    ls.set_setpoint(310.0).unwrap();
    assert!((ls.setpoint().unwrap() - 310.0).abs() < 1e-12);
    assert_eq!(ls.heater_output().unwrap(), "45.2");
    assert_eq!(
        link.written(),
        vec!["RAMP 1,1,4", "SETP 1,310", "SETP? 1", "HTR?"]
    );
}

#[test]
fn silent_instrument_surfaces_timeout() {
    let link = ScriptedLink::default();
    let mut ls = lakeshore(&link);
    let err = ls.read_temperature(Channel::B).expect_err("no reply queued");
    assert!(matches!(
        err.downcast_ref::<HwError>(),
        Some(HwError::Timeout)
    ));
}

#[test]
fn garbage_reply_is_malformed() {
    let link = ScriptedLink::with_replies(&["T_OVER"]);
    let mut ls = lakeshore(&link);
    let err = ls.read_temperature(Channel::B).expect_err("unparsable");
    assert!(format!("{err}").contains("malformed reply"));
}

#[test]
fn lockin_snapshot_maps_outputs() {
    let link = ScriptedLink::with_replies(&[
        "1.0E-3", "2.0E-3", "2.236E-3", "63.4", "1000.0", "0.1", "12.5",
    ]);
    let mut li = Sr860::new(Session::new(link.clone(), Duration::ZERO));
    let s = li.snapshot().expect("snapshot");
    assert_eq!(s.x_v, 1.0e-3);
    assert_eq!(s.y_v, 2.0e-3);
    assert_eq!(s.magnitude_v, 2.236e-3);
    assert_eq!(s.theta_deg, 63.4);
    assert_eq!(s.frequency_hz, 1000.0);
    assert_eq!(s.sine_amplitude_v, 0.1);
    assert_eq!(s.phase_deg, 12.5);
    assert_eq!(
        link.written(),
        vec!["OUTP? 0", "OUTP? 1", "OUTP? 2", "OUTP? 3", "FREQ?", "SLVL?", "PHAS?"]
    );
}
