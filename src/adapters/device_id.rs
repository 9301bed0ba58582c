//! Device identity derived from the ESP32 factory MAC address.
//!
//! The id is the full 6-byte MAC in lowercase hex (`a1b2c3d4e5f6`).  It is
//! burned into eFuse, so it is stable across reboots and reflashes, and it
//! is what the hub keys every entity of this node on.

use core::fmt::Write;

/// Lowercase hex MAC, 12 chars.
pub type DeviceIdString = heapless::String<12>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: the buffer is exactly the 6 bytes the call writes.
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    for byte in mac {
        let _ = write!(id, "{byte:02x}");
    }
    id
}
