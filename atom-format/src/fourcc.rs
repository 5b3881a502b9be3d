use std::fmt;

/// Byte used to pad names shorter than four bytes.
pub const FILLER: u8 = b' ';

/// A four-character atom type code, such as `moov` or `\xa9nam`.
///
/// Codes are raw bytes. Conversion from text is Latin-1: every `char` up to
/// U+00FF maps onto exactly one byte, so `"©nam"` becomes `[0xa9, b'n', b'a', b'm']`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct FourCC(pub [u8; 4]);

impl FourCC {
    /// Builds a code from arbitrary bytes, truncating or padding with [`FILLER`].
    pub fn normalized(bytes: &[u8]) -> FourCC {
        let mut out = [FILLER; 4];
        for (slot, byte) in out.iter_mut().zip(bytes.iter()) {
            *slot = *byte;
        }
        FourCC(out)
    }

    /// Builds a code from exactly four bytes.
    pub fn exact(bytes: &[u8]) -> Option<FourCC> {
        let bytes: [u8; 4] = bytes.try_into().ok()?;
        Some(FourCC(bytes))
    }

    /// Converts text to bytes using Latin-1, failing on wider characters.
    pub fn latin1(s: &str) -> Option<Vec<u8>> {
        s.chars()
            .map(|c| u8::try_from(u32::from(c)).ok())
            .collect()
    }

    /// Parses text that must encode to exactly four Latin-1 bytes.
    pub fn parse(s: &str) -> Option<FourCC> {
        Self::exact(&Self::latin1(s)?)
    }

    #[inline(always)]
    pub const fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(bytes: [u8; 4]) -> Self {
        FourCC(bytes)
    }
}

impl PartialEq<[u8; 4]> for FourCC {
    fn eq(&self, other: &[u8; 4]) -> bool {
        &self.0 == other
    }
}

impl PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.0 == *other
    }
}

impl fmt::Display for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            // Latin-1 is the first 256 code points, so this is lossless.
            write!(f, "{}", char::from(byte))?;
        }
        Ok(())
    }
}

impl fmt::Debug for FourCC {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCC({:?})", self.to_string())
    }
}
