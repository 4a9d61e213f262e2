//! Fuzz target: DS18B20 `w1_slave` parser
//!
//! Arbitrary sysfs content must either parse to a finite temperature or
//! fail with a sensor error, never panic.
//!
//! cargo fuzz run fuzz_w1_slave

#![no_main]

use brewcore::sensors::thermometer::parse_w1_slave;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let raw = String::from_utf8_lossy(data);
    if let Ok(celsius) = parse_w1_slave(&raw) {
        assert!(celsius.is_finite());
    }
});
