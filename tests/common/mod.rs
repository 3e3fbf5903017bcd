#![allow(dead_code)]

use std::fs;

use chrono::{TimeZone, Utc};
use pgp_core::config::{Config, ConfigBuilder};

pub const TEST_KEY_1: u64 = 0xA34D_7E18_C20C_31BB;
pub const TEST_KEY_3: u64 = 0x3389_3425_0CCC_0360;

pub const SIGNED_INPUT: &str = "Signed message\nline 2\nline 3\n";
pub const SIGNED_TEXT_INPUT: &str = "Signed message\r\nline 2\r\nline 3\r\n";

pub fn fixture(name: &str) -> Vec<u8> {
    fs::read(format!("tests/fixtures/{name}")).unwrap()
}

pub fn fixture_str(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}")).unwrap()
}

/// Decodes a fixture holding hex, whitespace is ignored.
pub fn fixture_hex(name: &str) -> Vec<u8> {
    let text: String = fixture_str(name).split_whitespace().collect();
    hex::decode(text).unwrap()
}

/// Default configuration with the clock fixed at midnight of the given day.
pub fn config_at(year: i32, month: u32, day: u32) -> Config {
    ConfigBuilder::default()
        .now(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap())
        .build()
        .unwrap()
}
