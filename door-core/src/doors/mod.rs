//! Door actuator sequencing.
//!
//! Each door is driven open-loop: a command latches the servo at its open
//! position and records a deadline; the sequencer releases the servo once the
//! hold window elapses. Return-to-closed is the linkage's passive mechanism,
//! so no reverse motion is ever commanded. A command aimed at a door that is
//! already mid-motion is ignored rather than restarted, keeping the servo
//! angle deterministic.

#![allow(clippy::module_name_repetitions)]

use core::ops::Add;
use core::time::Duration;

/// How long an actuator holds the open position once commanded.
pub const OPEN_HOLD_DURATION: Duration = Duration::from_secs(10);

/// Identifier for the two independently movable doors.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DoorId {
    First,
    Second,
}

impl DoorId {
    /// Both doors, in command order.
    pub const ALL: [DoorId; 2] = [DoorId::First, DoorId::Second];

    /// Deterministic index for per-door bookkeeping.
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            DoorId::First => 0,
            DoorId::Second => 1,
        }
    }
}

/// Motions callers may request from the sequencer.
///
/// This is the only mutation surface exposed to the button slot and the
/// network request handlers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DoorCommand {
    OpenFirst,
    OpenSecond,
    OpenBoth,
}

/// Abstraction over the physical servo linkage drivers.
pub trait DoorDriver {
    /// Called once at start-up to put the linkage into its rest position.
    fn begin(&mut self);

    /// Drives the actuator to its open position and holds it there.
    fn hold_open(&mut self, door: DoorId);

    /// Stops driving the actuator; the linkage returns to rest passively.
    fn release(&mut self, door: DoorId);
}

/// Driver that performs no hardware interaction.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopDoorDriver;

impl NoopDoorDriver {
    /// Creates a new no-op door driver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl DoorDriver for NoopDoorDriver {
    fn begin(&mut self) {}

    fn hold_open(&mut self, _: DoorId) {}

    fn release(&mut self, _: DoorId) {}
}

/// Timed sequencer for both door actuators.
///
/// `open_*` calls return immediately with "request accepted"; the motion
/// itself is tracked as a deadline checked by [`DoorSequencer::poll`] on
/// later passes. The two doors move independently, so `open_both` starts
/// both motions within the same pass.
#[derive(Debug)]
pub struct DoorSequencer<Instant, D> {
    driver: D,
    hold: Duration,
    deadlines: [Option<Instant>; 2],
}

impl<Instant, D> DoorSequencer<Instant, D>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
    D: DoorDriver,
{
    /// Creates a sequencer using the default [`OPEN_HOLD_DURATION`].
    pub fn new(driver: D) -> Self {
        Self::with_hold_duration(driver, OPEN_HOLD_DURATION)
    }

    /// Creates a sequencer with an explicit hold duration.
    pub fn with_hold_duration(driver: D, hold: Duration) -> Self {
        Self {
            driver,
            hold,
            deadlines: [None; 2],
        }
    }

    /// Initializes both actuators at their rest position.
    pub fn begin(&mut self) {
        self.driver.begin();
    }

    /// Starts a timed open motion for one door.
    ///
    /// Returns `false` when the door is already mid-motion; the in-flight
    /// motion is neither interrupted nor restarted.
    pub fn open(&mut self, door: DoorId, now: Instant) -> bool {
        if self.is_moving(door) {
            return false;
        }
        self.deadlines[door.as_index()] = Some(now + self.hold);
        self.driver.hold_open(door);
        true
    }

    /// Starts the first door's open motion.
    pub fn open_first(&mut self, now: Instant) -> bool {
        self.open(DoorId::First, now)
    }

    /// Starts the second door's open motion.
    pub fn open_second(&mut self, now: Instant) -> bool {
        self.open(DoorId::Second, now)
    }

    /// Starts both motions concurrently; neither waits on the other.
    pub fn open_both(&mut self, now: Instant) -> (bool, bool) {
        (self.open(DoorId::First, now), self.open(DoorId::Second, now))
    }

    /// Applies a [`DoorCommand`] at the given instant.
    pub fn apply(&mut self, command: DoorCommand, now: Instant) {
        match command {
            DoorCommand::OpenFirst => {
                self.open_first(now);
            }
            DoorCommand::OpenSecond => {
                self.open_second(now);
            }
            DoorCommand::OpenBoth => {
                self.open_both(now);
            }
        }
    }

    /// Releases any actuator whose hold window has elapsed. Call every pass.
    pub fn poll(&mut self, now: Instant) {
        for door in DoorId::ALL {
            if let Some(deadline) = self.deadlines[door.as_index()]
                && now >= deadline
            {
                self.deadlines[door.as_index()] = None;
                self.driver.release(door);
            }
        }
    }

    /// Reports whether a door is currently mid-motion.
    #[must_use]
    pub fn is_moving(&self, door: DoorId) -> bool {
        self.deadlines[door.as_index()].is_some()
    }

    /// Returns the hold duration in effect.
    #[must_use]
    pub const fn hold_duration(&self) -> Duration {
        self.hold
    }

    /// Accesses the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Mutably accesses the underlying driver.
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}
