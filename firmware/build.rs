use std::env;
use std::path::Path;

const CONFIG_KEYS: [&str; 4] = ["WIFI_SSID", "WIFI_PASSWORD", "API_KEY", "OTA_PASSWORD"];

fn main() {
    load_env_config();

    // linkall.x must be the last linker script; only relevant for the MCU
    // target, the host build is a stub binary.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("none") {
        println!("cargo:rustc-link-arg=-Tlinkall.x");
    }
}

/// Bakes device configuration into the binary. Environment variables take
/// priority over the `.env` file.
fn load_env_config() {
    println!("cargo:rerun-if-changed=.env");
    for key in CONFIG_KEYS {
        println!("cargo:rerun-if-env-changed={key}");
    }

    if Path::new(".env").exists() {
        if let Err(err) = dotenvy::dotenv() {
            println!("cargo:warning=failed to load .env: {err}");
        }
    }

    for key in CONFIG_KEYS {
        let value = env::var(key).unwrap_or_default();
        println!("cargo:rustc-env={key}={}", value.trim());
        if value.trim().is_empty() {
            println!("cargo:warning={key} is empty; set it in .env before flashing");
        }
    }
}
