//! Fuzz target: DHT22 frame and DS18B20 scratchpad decoders
//!
//! Feeds arbitrary bytes to both decoders.  Neither may panic, and any
//! value they accept must be finite and inside the sensor's datasheet
//! range.
//!
//! cargo fuzz run fuzz_sensor_frames

#![no_main]

use libfuzzer_sys::fuzz_target;
use soilguard::sensors::air::decode_frame;
use soilguard::sensors::soil_temp::decode_scratchpad;

fuzz_target!(|data: &[u8]| {
    if let Some(frame) = data.first_chunk::<5>() {
        if let Ok(r) = decode_frame(frame) {
            assert!((0.0..=100.0).contains(&r.humidity), "humidity {}", r.humidity);
            assert!((-40.0..=80.0).contains(&r.celsius), "air {}", r.celsius);
        }
    }

    if let Some(pad) = data.first_chunk::<9>() {
        if let Ok(c) = decode_scratchpad(pad) {
            assert!(c.is_finite() && (-55.0..=125.0).contains(&c), "soil {}", c);
        }
    }
});
