//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable device ID in the form `SG-XXYYZZ`
//! (last 3 bytes of the 6-byte MAC in uppercase hex), plus a per-boot
//! token so status pollers can tell a restart from a long uptime.

use core::fmt::Write;

/// Fixed-size id string: "SG-XXYYZZ" or an 8-digit boot token.
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the short device ID from the last 3 MAC bytes.
/// Format: `SG-XXYYZZ` (e.g., `SG-EFCAFE`).
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "SG-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Hardware RNG word; seeded from RF noise once the radio has run.
#[cfg(all(target_os = "espidf", feature = "espidf"))]
fn random_u32() -> u32 {
    unsafe { esp_idf_svc::sys::esp_random() }
}

#[cfg(not(all(target_os = "espidf", feature = "espidf")))]
fn random_u32() -> u32 {
    use std::hash::{BuildHasher, Hasher};
    let mut h = std::collections::hash_map::RandomState::new().build_hasher();
    h.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default(),
    );
    h.finish() as u32
}

/// Random per-boot token, 8 lowercase hex digits.
pub fn boot_token() -> DeviceIdString {
    format_token(random_u32())
}

fn format_token(word: u32) -> DeviceIdString {
    let mut token = DeviceIdString::new();
    let _ = write!(token, "{:08x}", word);
    token
}
