use core::ops::Add;
use core::time::Duration;

use door_core::button::{DEBOUNCE_WINDOW, DebouncedButton, Level, Polarity, PressEvent};

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

/// Replays a (level, time) trace and counts committed press events.
fn press_count(button: &mut DebouncedButton<MockInstant>, trace: &[(Level, u64)]) -> usize {
    trace
        .iter()
        .filter(|(level, millis)| button.update(*level, at(*millis)) == Some(PressEvent::Pressed))
        .count()
}

#[test]
fn one_stable_press_fires_exactly_once() {
    let mut button = DebouncedButton::new(Polarity::ActiveLow);
    let trace = [
        (Level::Low, 0),
        (Level::Low, 10),
        (Level::Low, 25),
        (Level::Low, 50),
        (Level::Low, 75),
        (Level::Low, 2_000),
        (Level::High, 2_010),
        (Level::High, 2_060),
    ];
    assert_eq!(press_count(&mut button, &trace), 1);
    assert!(!button.is_pressed());
}

#[test]
fn glitches_shorter_than_the_window_never_fire() {
    let mut button = DebouncedButton::new(Polarity::ActiveLow);
    // 20 ms blip, well under the 50 ms window.
    let trace = [
        (Level::Low, 0),
        (Level::Low, 10),
        (Level::High, 20),
        (Level::High, 30),
        (Level::High, 200),
    ];
    assert_eq!(press_count(&mut button, &trace), 0);
}

#[test]
fn bounce_storm_that_never_stabilizes_produces_no_event() {
    let mut button = DebouncedButton::new(Polarity::ActiveLow);
    // Edges every 10 ms for half a second; the raw level is never stable for
    // the full window, so losing the press is the intended outcome.
    let mut fired = 0;
    for step in 0..50_u64 {
        let level = if step % 2 == 0 { Level::Low } else { Level::High };
        if button.update(level, at(step * 10)) == Some(PressEvent::Pressed) {
            fired += 1;
        }
    }
    assert_eq!(fired, 0);
    assert!(!button.is_pressed());
}

#[test]
fn each_distinct_press_fires_again() {
    let mut button = DebouncedButton::new(Polarity::ActiveLow);
    let mut fired = 0;
    for press in 0..3_u64 {
        let base = press * 1_000;
        let trace = [
            (Level::Low, base),
            (Level::Low, base + DEBOUNCE_WINDOW.as_millis() as u64),
            (Level::High, base + 500),
            (Level::High, base + 500 + DEBOUNCE_WINDOW.as_millis() as u64),
        ];
        fired += press_count(&mut button, &trace);
    }
    assert_eq!(fired, 3);
}

#[test]
fn release_is_reported_but_never_as_a_press() {
    let mut button = DebouncedButton::new(Polarity::ActiveLow);
    button.update(Level::Low, at(0));
    assert_eq!(button.update(Level::Low, at(50)), Some(PressEvent::Pressed));
    button.update(Level::High, at(400));
    assert_eq!(
        button.update(Level::High, at(450)),
        Some(PressEvent::Released)
    );
}
