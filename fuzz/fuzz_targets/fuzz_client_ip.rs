//! Fuzz testing for client address resolution.
//!
//! Forwarded headers and the `TRUSTED_PROXIES` list are attacker- or
//! operator-controlled text. Parsing them must never panic, and whatever
//! `first_public_forwarded` picks must be a public address.
//!
//! # Running the Fuzz Tests
//!
//! ```bash
//! cargo +nightly install cargo-fuzz
//! cargo +nightly fuzz run fuzz_client_ip
//! cargo +nightly fuzz run fuzz_client_ip -- -max_total_time=60
//! ```

#![no_main]

use std::net::{IpAddr, Ipv4Addr};

use libfuzzer_sys::fuzz_target;
use senatron::middleware::ip::{CidrRange, first_public_forwarded, is_public};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        if let Some(ip) = first_public_forwarded(s) {
            assert!(is_public(&ip));
        }

        if let Some(range) = CidrRange::parse(s) {
            let _ = range.contains(&IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
    }
});
