use serde::{Serialize, Serializer};

use crate::error::{CalibrationError, CalibrationResult};

/// One captured broadcast, as an ordered byte sequence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Frame(Box<[u8]>);

impl Frame {
    /// Parses space-separated two-digit hex tokens, e.g. `"02 1C 18"`.
    pub fn parse(hex: &str) -> CalibrationResult<Self> {
        let bytes = hex
            .split_ascii_whitespace()
            .enumerate()
            .map(|(position, token)| parse_token(position, token))
            .collect::<CalibrationResult<Vec<u8>>>()?;

        if bytes.is_empty() {
            return Err(CalibrationError::EmptyFrame);
        }

        Ok(Self(bytes.into_boxed_slice()))
    }

    /// Parses a frame that must have exactly `expected` bytes.
    ///
    /// The reported index is the position of the measurement in its batch.
    pub fn parse_expecting(hex: &str, index: usize, expected: usize) -> CalibrationResult<Self> {
        let frame = Self::parse(hex)?;
        if frame.len() != expected {
            return Err(CalibrationError::FrameLengthMismatch {
                index,
                expected,
                actual: frame.len(),
            });
        }
        Ok(frame)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Uppercase, single-space separated hex.
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

fn parse_token(position: usize, token: &str) -> CalibrationResult<u8> {
    let malformed = || CalibrationError::MalformedFrame {
        position,
        token: token.to_owned(),
    };

    // from_str_radix alone would accept "1" or "+1"
    if token.len() != 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(malformed());
    }

    u8::from_str_radix(token, 16).map_err(|_| malformed())
}

impl core::fmt::Display for Frame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, byte) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{byte:02X}")?;
        }
        Ok(())
    }
}

impl Serialize for Frame {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
