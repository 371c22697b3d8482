//! Native-text decoding helpers.
//!
//! Platform input APIs report device and channel names as fixed-size buffers
//! of UTF-16 code units (often NUL-padded). Descriptors keep those raw
//! buffers for identity comparison and decode them lazily through this
//! module when a human-readable name is first requested.

/// Decode a raw UTF-16 buffer into a `String`.
///
/// The buffer is treated as NUL-terminated: everything from the first NUL
/// unit onward is dropped. Unpaired surrogates are replaced rather than
/// rejected, since firmware-provided names are not guaranteed to be valid.
pub fn decode_utf16(units: &[u16]) -> String {
    let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
    String::from_utf16_lossy(&units[..end])
}

/// Encode a `&str` as UTF-16 code units, the platform's native form.
///
/// Used by backends and test fixtures that synthesize descriptors.
pub fn encode_utf16(text: &str) -> Vec<u16> {
    text.encode_utf16().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_stops_at_first_nul() {
        let mut units = encode_utf16("Throttle");
        units.extend([0, 0, 0]);
        units.extend(encode_utf16("junk"));
        assert_eq!(decode_utf16(&units), "Throttle");
    }

    #[test]
    fn decode_handles_non_ascii_names() {
        // Mirrors the kind of names seen on localized devices.
        let units = encode_utf16("Pound £ Alpha α Oméga ω");
        assert_eq!(decode_utf16(&units), "Pound £ Alpha α Oméga ω");
    }

    #[test]
    fn decode_replaces_unpaired_surrogates() {
        let units = [0x0041, 0xD800, 0x0042];
        assert_eq!(decode_utf16(&units), "A\u{FFFD}B");
    }

    #[test]
    fn roundtrip() {
        assert_eq!(decode_utf16(&encode_utf16("Flight Stick Pro")), "Flight Stick Pro");
    }
}
