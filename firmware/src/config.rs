//! Compiled-in device configuration.
//!
//! Secrets come from `.env` (or real environment variables) at build time via
//! the dotenvy build script; see `.env.example`. Nothing here is read at
//! runtime from flash or network.

/// Station SSID to associate with.
pub const WIFI_SSID: &str = env!("WIFI_SSID");

/// Station passphrase.
pub const WIFI_PASSWORD: &str = env!("WIFI_PASSWORD");

/// Shared secret required on the door-opening HTTP routes.
pub const API_KEY: &str = env!("API_KEY");

/// Password guarding the update-transfer listener.
pub const OTA_PASSWORD: &str = env!("OTA_PASSWORD");

/// mDNS hostname and service instance name (`gandalf.local`).
pub const DEVICE_NAME: &str = "gandalf";

pub const HTTP_PORT: u16 = 80;
pub const OTA_PORT: u16 = 3232;
