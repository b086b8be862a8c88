//! Association over the esp-wifi station interface.

use door_core::wifi::Association;
use esp_println::println;
use esp_wifi::wifi::{AuthMethod, ClientConfiguration, Configuration, WifiController};

/// Station-mode link driven by the connectivity monitor. All failures are
/// logged and surface as "not associated"; the monitor's timeout/retry policy
/// does the recovery.
pub struct WifiLink<'d> {
    controller: WifiController<'d>,
}

impl<'d> WifiLink<'d> {
    pub fn new(mut controller: WifiController<'d>, ssid: &str, password: &str) -> Self {
        let client = ClientConfiguration {
            ssid: ssid.try_into().unwrap_or_default(),
            password: password.try_into().unwrap_or_default(),
            auth_method: AuthMethod::WPA2Personal,
            ..Default::default()
        };
        if let Err(err) = controller.set_configuration(&Configuration::Client(client)) {
            println!("wifi: set_configuration failed: {err:?}");
        }
        Self { controller }
    }
}

impl Association for WifiLink<'_> {
    fn begin(&mut self) {
        if !matches!(self.controller.is_started(), Ok(true))
            && let Err(err) = self.controller.start()
        {
            println!("wifi: start failed: {err:?}");
            return;
        }
        if let Err(err) = self.controller.connect() {
            println!("wifi: connect failed: {err:?}");
        }
    }

    fn is_associated(&self) -> bool {
        matches!(self.controller.is_connected(), Ok(true))
    }
}
