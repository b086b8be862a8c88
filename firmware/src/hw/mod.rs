//! Board bindings: servo outputs on the LEDC peripheral and the flash button.

use door_core::button::Level;
use door_core::doors::{DoorDriver, DoorId};
use esp_hal::gpio::Input;
use esp_hal::ledc::channel::{Channel, ChannelIFace};
use esp_hal::ledc::LowSpeed;
use esp_println::println;

/// 50 Hz servo frame; the duty percentages below land near the usual
/// 1 ms (closed) and 2 ms (open) pulse widths.
pub const SERVO_HZ: u32 = 50;
const CLOSED_DUTY_PCT: u8 = 5;
const OPEN_DUTY_PCT: u8 = 10;

pub struct ServoDoors<'d> {
    channels: [Channel<'d, LowSpeed>; 2],
}

impl<'d> ServoDoors<'d> {
    pub fn new(first: Channel<'d, LowSpeed>, second: Channel<'d, LowSpeed>) -> Self {
        Self {
            channels: [first, second],
        }
    }

    fn set_duty(&self, door: DoorId, duty_pct: u8) {
        if let Err(err) = self.channels[door.as_index()].set_duty(duty_pct) {
            println!("servo: setting duty for door {} failed: {err:?}", door.as_index() + 1);
        }
    }
}

impl DoorDriver for ServoDoors<'_> {
    fn begin(&mut self) {
        for door in DoorId::ALL {
            self.set_duty(door, CLOSED_DUTY_PCT);
        }
    }

    fn hold_open(&mut self, door: DoorId) {
        self.set_duty(door, OPEN_DUTY_PCT);
    }

    fn release(&mut self, door: DoorId) {
        self.set_duty(door, CLOSED_DUTY_PCT);
    }
}

/// The boot/flash button on GPIO0, active low.
pub struct FlashButton<'d> {
    pin: Input<'d>,
}

impl<'d> FlashButton<'d> {
    pub fn new(pin: Input<'d>) -> Self {
        Self { pin }
    }

    pub fn level(&self) -> Level {
        if self.pin.is_low() {
            Level::Low
        } else {
            Level::High
        }
    }
}
