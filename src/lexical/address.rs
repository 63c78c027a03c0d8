//! Network address literal recognition
//!
//! IPv4 and IPv6 candidates are gated on shape before parsing: a run is only
//! considered an IPv6 candidate when it contains at least two colons, so that
//! `host:alias` style text never turns into an address error. Actual parsing
//! is delegated to the standard library address types.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Outcome of trying to read a word run as a network address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressClass {
    /// A valid IPv4 address, optionally with `/cidr` or `/dotted-netmask`
    V4,
    /// A valid IPv6 address, optionally with `/cidr`
    V6,
    /// Shaped like an IPv6 address but does not parse
    MalformedV6,
    /// Not an address at all; lex as an ordinary word
    NotAddress,
}

/// Whether every character could appear in an address literal
fn has_address_charset(text: &str) -> bool {
    text.bytes()
        .all(|b| b.is_ascii_hexdigit() || b == b':' || b == b'.' || b == b'/')
}

fn valid_v4(base: &str, mask: Option<&str>) -> bool {
    if base.parse::<Ipv4Addr>().is_err() {
        return false;
    }
    match mask {
        None => true,
        Some(m) => m.parse::<u8>().map(|n| n <= 32).unwrap_or(false) || m.parse::<Ipv4Addr>().is_ok(),
    }
}

fn valid_v6(base: &str, mask: Option<&str>) -> bool {
    if base.parse::<Ipv6Addr>().is_err() {
        return false;
    }
    match mask {
        None => true,
        Some(m) => m.parse::<u8>().map(|n| n <= 128).unwrap_or(false),
    }
}

/// Classify a complete word run as an address literal
pub fn classify_address(text: &str) -> AddressClass {
    if !has_address_charset(text) {
        return AddressClass::NotAddress;
    }

    let (base, mask) = match text.split_once('/') {
        Some((base, mask)) => (base, Some(mask)),
        None => (text, None),
    };
    if matches!(mask, Some(m) if m.contains('/')) {
        return AddressClass::NotAddress;
    }

    let colons = base.bytes().filter(|&b| b == b':').count();
    if colons >= 2 {
        if valid_v6(base, mask) {
            return AddressClass::V6;
        }
        return AddressClass::MalformedV6;
    }

    if base.contains('.') && valid_v4(base, mask) {
        return AddressClass::V4;
    }

    AddressClass::NotAddress
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_forms() {
        assert_eq!(classify_address("192.168.1.1"), AddressClass::V4);
        assert_eq!(classify_address("10.0.0.0/8"), AddressClass::V4);
        assert_eq!(
            classify_address("10.0.0.0/255.255.255.0"),
            AddressClass::V4
        );
        assert_eq!(classify_address("10.0.0.0/33"), AddressClass::NotAddress);
        assert_eq!(classify_address("300.1.1.1"), AddressClass::NotAddress);
    }

    #[test]
    fn test_ipv6_forms() {
        assert_eq!(classify_address("::1"), AddressClass::V6);
        assert_eq!(classify_address("fe80::1"), AddressClass::V6);
        assert_eq!(classify_address("fe80::1/64"), AddressClass::V6);
        assert_eq!(classify_address("fe80::1/129"), AddressClass::MalformedV6);
        assert_eq!(classify_address("fe80::1::2"), AddressClass::MalformedV6);
    }

    #[test]
    fn test_candidacy_gate() {
        // A single colon is never an IPv6 candidate
        assert_eq!(classify_address("dead:beef"), AddressClass::NotAddress);
        // Plain words fall through untouched
        assert_eq!(classify_address("admin"), AddressClass::NotAddress);
        assert_eq!(classify_address("host.example.com"), AddressClass::NotAddress);
    }
}
