//! Top-level cooperative control loop.
//!
//! One `poll` call is one pass, performing in fixed order: advance the
//! connectivity machine, service the network-facing handlers only while
//! connected, then always service the button. The ordering is what keeps the
//! physical button responsive regardless of connectivity state or network
//! load, so it must not be rearranged.

#![allow(clippy::module_name_repetitions)]

use core::ops::Add;
use core::time::Duration;

use crate::button::{DebouncedButton, Level, Polarity, PressEvent};
use crate::doors::{DoorCommand, DoorDriver, DoorSequencer};
use crate::wifi::{Association, ConnectivityMonitor, LinkEvent, LinkState};

/// One-time bring-up latch for the network-facing services.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct ServiceActivation {
    activated: bool,
}

impl ServiceActivation {
    /// Creates an unfired latch.
    #[must_use]
    pub const fn new() -> Self {
        Self { activated: false }
    }

    /// Fires the latch. Returns `true` exactly once; later calls are no-ops.
    pub fn try_activate(&mut self) -> bool {
        if self.activated {
            false
        } else {
            self.activated = true;
            true
        }
    }

    /// Reports whether the latch has fired.
    #[must_use]
    pub const fn is_activated(&self) -> bool {
        self.activated
    }
}

/// Network-facing services owned by the platform layer.
///
/// `activate` runs once, after the first successful association. `handle` is
/// polled every pass while the link is up, does at most the work available
/// this pass, and may surface at most one door command from the request
/// dispatcher.
pub trait NetworkServices {
    /// One-time bring-up of the request handler, update listener, and
    /// discovery advertisement.
    fn activate(&mut self);

    /// Services at most one unit of pending network work.
    fn handle(&mut self) -> Option<DoorCommand>;
}

/// Services placeholder for targets without a network surface.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopServices;

impl NetworkServices for NoopServices {
    fn activate(&mut self) {}

    fn handle(&mut self) -> Option<DoorCommand> {
        None
    }
}

/// Outcome of a single control-loop pass, for diagnostics.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PassReport {
    /// Connectivity transition observed this pass, if any.
    pub link_event: Option<LinkEvent>,
    /// Whether service activation ran this pass.
    pub services_activated: bool,
    /// Door command surfaced by the request dispatcher this pass, if any.
    pub request_command: Option<DoorCommand>,
    /// Committed button transition this pass, if any.
    pub press_event: Option<PressEvent>,
}

/// The repeatedly-invoked driver unifying connectivity, network service, and
/// input handling on one thread with no blocking calls.
#[derive(Debug)]
pub struct ControlLoop<Instant, D> {
    connectivity: ConnectivityMonitor<Instant>,
    button: DebouncedButton<Instant>,
    doors: DoorSequencer<Instant, D>,
    activation: ServiceActivation,
    press_command: DoorCommand,
}

impl<Instant, D> ControlLoop<Instant, D>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
    D: DoorDriver,
{
    /// Creates a loop around the given sequencer with default components:
    /// an active-low button and a press bound to opening both doors.
    pub fn new(doors: DoorSequencer<Instant, D>) -> Self {
        Self::with_components(
            ConnectivityMonitor::new(),
            DebouncedButton::new(Polarity::ActiveLow),
            doors,
        )
    }

    /// Creates a loop from explicitly configured components.
    pub fn with_components(
        connectivity: ConnectivityMonitor<Instant>,
        button: DebouncedButton<Instant>,
        doors: DoorSequencer<Instant, D>,
    ) -> Self {
        Self {
            connectivity,
            button,
            doors,
            activation: ServiceActivation::new(),
            press_command: DoorCommand::OpenBoth,
        }
    }

    /// Registers the motion a committed press triggers, replacing any prior
    /// registration.
    pub fn set_press_command(&mut self, command: DoorCommand) {
        self.press_command = command;
    }

    /// One-time start-up: actuators to rest, then the first association
    /// attempt. The button works from this point on, network or not.
    pub fn begin<A: Association>(&mut self, link: &mut A, now: Instant) {
        self.doors.begin();
        self.connectivity.start_connection(link, now);
    }

    /// Runs one pass. Never blocks.
    pub fn poll<A, S>(
        &mut self,
        link: &mut A,
        services: &mut S,
        button_level: Level,
        now: Instant,
    ) -> PassReport
    where
        A: Association,
        S: NetworkServices,
    {
        let mut report = PassReport {
            link_event: self.connectivity.poll(link, now),
            ..PassReport::default()
        };

        if report.link_event == Some(LinkEvent::Connected) && self.activation.try_activate() {
            services.activate();
            report.services_activated = true;
        }

        if self.connectivity.state() == LinkState::Connected {
            report.request_command = services.handle();
            if let Some(command) = report.request_command {
                self.doors.apply(command, now);
            }
        }

        report.press_event = self.button.update(button_level, now);
        if report.press_event == Some(PressEvent::Pressed) {
            self.doors.apply(self.press_command, now);
        }

        self.doors.poll(now);
        report
    }

    /// Read-only view of the connectivity monitor.
    pub fn connectivity(&self) -> &ConnectivityMonitor<Instant> {
        &self.connectivity
    }

    /// Read-only view of the door sequencer.
    pub fn doors(&self) -> &DoorSequencer<Instant, D> {
        &self.doors
    }

    /// Mutable access to the door sequencer.
    pub fn doors_mut(&mut self) -> &mut DoorSequencer<Instant, D> {
        &mut self.doors
    }

    /// Read-only view of the activation latch.
    pub fn activation(&self) -> &ServiceActivation {
        &self.activation
    }

    /// Read-only view of the button debouncer.
    pub fn button(&self) -> &DebouncedButton<Instant> {
        &self.button
    }
}
