//! Hex rendering of byte slices for trace logs.

use std::fmt;

/// Displays a byte slice as `5A.01.00.06`.
///
/// Wrapping instead of formatting eagerly means the string is only built when
/// the log level actually lets the record through.
pub struct HexBytes<'a>(pub &'a [u8]);

impl fmt::Display for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for HexBytes<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_bytes_dot_separated_uppercase() {
        assert_eq!(HexBytes(&[0x5A, 0x01, 0xab]).to_string(), "5A.01.AB");
    }

    #[test]
    fn test_hex_bytes_empty_slice_renders_empty() {
        assert_eq!(HexBytes(&[]).to_string(), "");
    }
}
