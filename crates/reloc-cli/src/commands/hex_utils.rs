//! Hex parsing and formatting utilities.

use anyhow::{Result, bail};

/// Parse a hex address string (with or without 0x prefix).
pub fn parse_hex_address(s: &str) -> Result<u64> {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(s, 16).map_err(|e| anyhow::anyhow!("Invalid hex address: {}", e))
}

/// Parse a position given in decimal, or in hex with a 0x prefix.
pub fn parse_position(s: &str) -> Result<u64> {
    if s.starts_with("0x") || s.starts_with("0X") {
        parse_hex_address(s)
    } else {
        s.parse()
            .map_err(|e| anyhow::anyhow!("Invalid position {:?}: {}", s, e))
    }
}

/// Parse hex bytes from one or more words; whitespace and `0x` prefixes
/// are ignored, so both `"40 41"` and `"4041"` work.
pub fn parse_hex_bytes<S: AsRef<str>>(words: &[S]) -> Result<Vec<u8>> {
    let digits: String = words
        .iter()
        .flat_map(|w| w.as_ref().split_whitespace())
        .map(|w| w.trim_start_matches("0x").trim_start_matches("0X"))
        .collect();
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits: {:?}", digits);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| anyhow::anyhow!("Invalid hex byte {:?}: {}", &digits[i..i + 2], e))
        })
        .collect()
}

/// Format bytes as space-separated uppercase hex.
pub fn format_hex_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_address_with_prefix() {
        assert_eq!(parse_hex_address("0x1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_address("0X1000").unwrap(), 0x1000);
    }

    #[test]
    fn test_parse_hex_address_without_prefix() {
        assert_eq!(parse_hex_address("1000").unwrap(), 0x1000);
        assert_eq!(parse_hex_address("DEADBEEF").unwrap(), 0xDEADBEEF);
    }

    #[test]
    fn test_parse_hex_address_invalid() {
        assert!(parse_hex_address("GHIJK").is_err());
        assert!(parse_hex_address("0xZZZ").is_err());
    }

    #[test]
    fn test_parse_position() {
        assert_eq!(parse_position("260").unwrap(), 260);
        assert_eq!(parse_position("0x104").unwrap(), 260);
        assert!(parse_position("1O4").is_err());
    }

    #[test]
    fn test_parse_hex_bytes() {
        assert_eq!(
            parse_hex_bytes(&["40 41", "0x80", "40"]).unwrap(),
            vec![0x40, 0x41, 0x80, 0x40]
        );
        assert_eq!(parse_hex_bytes(&["C0000040"]).unwrap(), vec![0xC0, 0, 0, 0x40]);
        assert!(parse_hex_bytes(&["404"]).is_err());
        assert!(parse_hex_bytes(&["zz"]).is_err());
    }

    #[test]
    fn test_format_hex_bytes() {
        assert_eq!(format_hex_bytes(&[0x40, 0x0A]), "40 0A");
        assert_eq!(format_hex_bytes(&[]), "");
    }
}
