//! Debounced push-button input handling.
//!
//! The handler is polled once per control-loop pass with the raw line level
//! and the current instant. Mechanical bounce is filtered by requiring the
//! raw level to stay stable for a full debounce window before the logical
//! level is committed; a committed released-to-pressed transition is reported
//! exactly once. Bursts that never stabilize for the full window produce no
//! event at all, which trades a missed marginal press for never reporting a
//! false double-press.

#![allow(clippy::module_name_repetitions)]

use core::ops::Add;
use core::time::Duration;

/// Minimum stable-signal duration before a raw edge is committed.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(50);

/// Electrical level observed on the input line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Level {
    Low,
    High,
}

/// Wiring polarity of the push button.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Polarity {
    /// Line idles high behind an internal pull-up; a press pulls it low.
    ActiveLow,
    /// Line idles low; a press drives it high.
    ActiveHigh,
}

impl Polarity {
    /// Level seen while the button is at rest.
    pub const fn idle_level(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::High,
            Polarity::ActiveHigh => Level::Low,
        }
    }

    /// Level seen while the button is held down.
    pub const fn pressed_level(self) -> Level {
        match self {
            Polarity::ActiveLow => Level::Low,
            Polarity::ActiveHigh => Level::High,
        }
    }
}

/// Committed logical transition produced by the debouncer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PressEvent {
    /// The button went from released to pressed.
    Pressed,
    /// The button went back to released.
    Released,
}

/// Debounce state machine for a single digital input line.
#[derive(Clone, Debug)]
pub struct DebouncedButton<Instant> {
    polarity: Polarity,
    window: Duration,
    raw: Level,
    debounced: Level,
    last_change: Option<Instant>,
}

impl<Instant> DebouncedButton<Instant>
where
    Instant: Copy + Ord + Add<Duration, Output = Instant>,
{
    /// Creates a handler using the default [`DEBOUNCE_WINDOW`].
    #[must_use]
    pub fn new(polarity: Polarity) -> Self {
        Self::with_window(polarity, DEBOUNCE_WINDOW)
    }

    /// Creates a handler with an explicit debounce window.
    #[must_use]
    pub fn with_window(polarity: Polarity, window: Duration) -> Self {
        Self {
            polarity,
            window,
            raw: polarity.idle_level(),
            debounced: polarity.idle_level(),
            last_change: None,
        }
    }

    /// Feeds one raw sample into the debouncer. Call every pass.
    ///
    /// A raw edge only records the change time; the logical level follows once
    /// the raw level has held steady for the configured window. Returns the
    /// committed transition, if this sample produced one.
    pub fn update(&mut self, raw: Level, now: Instant) -> Option<PressEvent> {
        if raw != self.raw {
            self.raw = raw;
            self.last_change = Some(now);
            return None;
        }

        if raw != self.debounced
            && let Some(changed_at) = self.last_change
            && now >= changed_at + self.window
        {
            self.debounced = raw;
            return Some(if raw == self.polarity.pressed_level() {
                PressEvent::Pressed
            } else {
                PressEvent::Released
            });
        }

        None
    }

    /// Reports the committed logical state.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.debounced == self.polarity.pressed_level()
    }

    /// Returns the debounce window in effect.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn idle_line_produces_no_events() {
        let mut button = DebouncedButton::new(Polarity::ActiveLow);
        for t in 0..10 {
            assert_eq!(button.update(Level::High, at(t * 100)), None);
        }
        assert!(!button.is_pressed());
    }

    #[test]
    fn stable_press_commits_once() {
        let mut button = DebouncedButton::new(Polarity::ActiveLow);
        assert_eq!(button.update(Level::Low, at(0)), None);
        assert_eq!(button.update(Level::Low, at(10)), None);
        assert_eq!(button.update(Level::Low, at(50)), Some(PressEvent::Pressed));
        // Holding the button further never re-fires.
        assert_eq!(button.update(Level::Low, at(100)), None);
        assert_eq!(button.update(Level::Low, at(10_000)), None);
        assert!(button.is_pressed());
    }

    #[test]
    fn release_resets_without_firing_pressed() {
        let mut button = DebouncedButton::new(Polarity::ActiveLow);
        button.update(Level::Low, at(0));
        button.update(Level::Low, at(50));
        assert_eq!(button.update(Level::High, at(60)), None);
        assert_eq!(
            button.update(Level::High, at(110)),
            Some(PressEvent::Released)
        );
        assert!(!button.is_pressed());
    }

    #[test]
    fn bounce_restarts_the_window() {
        let mut button = DebouncedButton::new(Polarity::ActiveLow);
        button.update(Level::Low, at(0));
        // Edge at 30 ms restarts the stability clock.
        assert_eq!(button.update(Level::High, at(30)), None);
        assert_eq!(button.update(Level::Low, at(40)), None);
        assert_eq!(button.update(Level::Low, at(60)), None);
        assert_eq!(button.update(Level::Low, at(90)), Some(PressEvent::Pressed));
    }

    #[test]
    fn active_high_polarity_inverts_levels() {
        let mut button = DebouncedButton::new(Polarity::ActiveHigh);
        assert!(!button.is_pressed());
        button.update(Level::High, at(0));
        assert_eq!(
            button.update(Level::High, at(50)),
            Some(PressEvent::Pressed)
        );
    }

    #[test]
    fn custom_window_is_honored() {
        let mut button =
            DebouncedButton::with_window(Polarity::ActiveLow, Duration::from_millis(5));
        button.update(Level::Low, at(0));
        assert_eq!(button.update(Level::Low, at(5)), Some(PressEvent::Pressed));
    }
}
