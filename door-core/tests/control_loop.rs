use core::ops::Add;
use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use door_core::auth::{self, RequestDecision};
use door_core::button::Level;
use door_core::control::{ControlLoop, NetworkServices, NoopServices, PassReport};
use door_core::doors::{DoorCommand, DoorDriver, DoorId, DoorSequencer};
use door_core::wifi::{Association, LinkState};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct MockInstant(u64);

impl Add<Duration> for MockInstant {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX))
    }
}

fn at(millis: u64) -> MockInstant {
    MockInstant(millis)
}

type TraceLog = Rc<RefCell<Vec<&'static str>>>;

#[derive(Debug, Default)]
struct FakeLink {
    associated: bool,
}

impl Association for FakeLink {
    fn begin(&mut self) {}

    fn is_associated(&self) -> bool {
        self.associated
    }
}

/// Driver that appends to a shared trace, to observe per-pass ordering.
struct TracingDriver {
    trace: TraceLog,
}

impl DoorDriver for TracingDriver {
    fn begin(&mut self) {
        self.trace.borrow_mut().push("doors-begin");
    }

    fn hold_open(&mut self, _: DoorId) {
        self.trace.borrow_mut().push("hold");
    }

    fn release(&mut self, _: DoorId) {
        self.trace.borrow_mut().push("release");
    }
}

/// Services stub that answers one scripted request per pass.
struct ScriptedServices {
    trace: TraceLog,
    activations: u32,
    next_request: Option<(&'static str, Option<&'static str>)>,
    api_key: &'static str,
}

impl ScriptedServices {
    fn new(trace: TraceLog, api_key: &'static str) -> Self {
        Self {
            trace,
            activations: 0,
            next_request: None,
            api_key,
        }
    }

    fn queue_request(&mut self, path: &'static str, query: Option<&'static str>) {
        self.next_request = Some((path, query));
    }
}

impl NetworkServices for ScriptedServices {
    fn activate(&mut self) {
        self.activations += 1;
        self.trace.borrow_mut().push("activate");
    }

    fn handle(&mut self) -> Option<DoorCommand> {
        self.trace.borrow_mut().push("handle");
        let (path, query) = self.next_request.take()?;
        match auth::decide(path, query, None, self.api_key) {
            RequestDecision::Accepted { command, .. } => command,
            RequestDecision::Unauthorized | RequestDecision::NotFound => None,
        }
    }
}

fn harness() -> (ControlLoop<MockInstant, TracingDriver>, ScriptedServices, TraceLog) {
    let trace: TraceLog = Rc::default();
    let driver = TracingDriver {
        trace: Rc::clone(&trace),
    };
    let services = ScriptedServices::new(Rc::clone(&trace), "speak-friend");
    let doors = DoorSequencer::new(driver);
    (ControlLoop::new(doors), services, trace)
}

/// Drives a press through the debounce window and returns the second report.
fn press_button<S: NetworkServices>(
    ctl: &mut ControlLoop<MockInstant, TracingDriver>,
    link: &mut FakeLink,
    services: &mut S,
    base_ms: u64,
) -> PassReport {
    ctl.poll(link, services, Level::Low, at(base_ms));
    ctl.poll(link, services, Level::Low, at(base_ms + 50))
}

#[test]
fn button_works_while_network_is_down() {
    let (mut ctl, _services, _trace) = harness();
    let mut link = FakeLink::default();
    let mut services = NoopServices;
    ctl.begin(&mut link, at(0));

    // Attempt times out; the machine sits in Failed. The button still fires
    // and opens both doors.
    ctl.poll(&mut link, &mut services, Level::High, at(20_000));
    assert_eq!(ctl.connectivity().state(), LinkState::Failed);

    let report = press_button(&mut ctl, &mut link, &mut services, 21_000);
    assert!(report.press_event.is_some());
    assert!(ctl.doors().is_moving(DoorId::First));
    assert!(ctl.doors().is_moving(DoorId::Second));
}

#[test]
fn services_are_skipped_until_connected() {
    let (mut ctl, mut services, trace) = harness();
    let mut link = FakeLink::default();
    ctl.begin(&mut link, at(0));

    ctl.poll(&mut link, &mut services, Level::High, at(100));
    assert!(!trace.borrow().contains(&"handle"));

    link.associated = true;
    ctl.poll(&mut link, &mut services, Level::High, at(200));
    // Activation precedes request handling on the connecting pass.
    assert_eq!(&*trace.borrow(), &["doors-begin", "activate", "handle"]);
}

#[test]
fn activation_runs_at_most_once_across_reconnects() {
    let (mut ctl, mut services, _trace) = harness();
    let mut link = FakeLink::default();
    ctl.begin(&mut link, at(0));

    let mut now = 0;
    for _ in 0..3 {
        link.associated = true;
        now += 100;
        ctl.poll(&mut link, &mut services, Level::High, at(now));
        assert_eq!(ctl.connectivity().state(), LinkState::Connected);

        link.associated = false;
        now += 100;
        ctl.poll(&mut link, &mut services, Level::High, at(now));
    }

    assert_eq!(services.activations, 1);
    assert!(ctl.activation().is_activated());
}

#[test]
fn authorized_request_moves_the_door() {
    let (mut ctl, mut services, _trace) = harness();
    let mut link = FakeLink { associated: true };
    ctl.begin(&mut link, at(0));
    ctl.poll(&mut link, &mut services, Level::High, at(10));

    services.queue_request("/openFirstDoor", Some("key=speak-friend"));
    let report = ctl.poll(&mut link, &mut services, Level::High, at(20));
    assert_eq!(report.request_command, Some(DoorCommand::OpenFirst));
    assert!(ctl.doors().is_moving(DoorId::First));
    assert!(!ctl.doors().is_moving(DoorId::Second));
}

#[test]
fn unauthorized_request_never_moves_a_door() {
    let (mut ctl, mut services, _trace) = harness();
    let mut link = FakeLink { associated: true };
    ctl.begin(&mut link, at(0));
    ctl.poll(&mut link, &mut services, Level::High, at(10));

    for query in [None, Some("key=wrong"), Some("apikey=speak-friend")] {
        services.queue_request("/openBothDoors", query);
        let report = ctl.poll(&mut link, &mut services, Level::High, at(20));
        assert_eq!(report.request_command, None);
        assert!(!ctl.doors().is_moving(DoorId::First));
        assert!(!ctl.doors().is_moving(DoorId::Second));
    }
}

#[test]
fn press_command_slot_is_replaceable() {
    let (mut ctl, _services, _trace) = harness();
    let mut link = FakeLink::default();
    let mut services = NoopServices;
    ctl.begin(&mut link, at(0));
    ctl.set_press_command(DoorCommand::OpenSecond);

    press_button(&mut ctl, &mut link, &mut services, 1_000);
    assert!(!ctl.doors().is_moving(DoorId::First));
    assert!(ctl.doors().is_moving(DoorId::Second));
}

#[test]
fn pass_order_is_connectivity_then_services_then_button() {
    let (mut ctl, mut services, trace) = harness();
    let mut link = FakeLink { associated: true };
    ctl.begin(&mut link, at(0));
    ctl.poll(&mut link, &mut services, Level::High, at(10));
    trace.borrow_mut().clear();

    // A pass that both services a request and commits a button press must
    // interleave in the fixed order: request work before button work.
    services.queue_request("/openFirstDoor", Some("key=speak-friend"));
    ctl.set_press_command(DoorCommand::OpenSecond);
    ctl.poll(&mut link, &mut services, Level::Low, at(100));
    let report = ctl.poll(&mut link, &mut services, Level::Low, at(150));
    assert!(report.press_event.is_some());
    assert_eq!(
        &*trace.borrow(),
        &["handle", "hold", "handle", "hold"],
        "request handling precedes button dispatch within a pass"
    );
}
