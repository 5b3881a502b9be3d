use crate::error::Dialect;
use crate::fourcc::FourCC;
use crate::tags::TEXT_FLAGS;

/// Upper bound on the number of top-level atoms read or scanned in one file.
pub const DEFAULT_MAX_TOP_LEVEL_ATOMS: usize = 1024;

/// Size of the chunks file-backed payloads are copied in.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Major brands whose layout the engine knows how to edit.
pub const DEFAULT_BRANDS: &[[u8; 4]] = &[
    *b"isom", *b"iso2", *b"mp41", *b"mp42", *b"3gp4", *b"3gp5", *b"3gp6", *b"3g2a", *b"M4V ",
    *b"M4A ", *b"qt  ",
];

/// Which metadata dialects the high-level tag operations touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dialects {
    pub iso: bool,
    pub itunes: bool,
    /// Only has an effect once an XMP store is attached.
    pub xmp: bool,
}

impl Default for Dialects {
    fn default() -> Self {
        Self {
            iso: true,
            itunes: true,
            xmp: true,
        }
    }
}

impl Dialects {
    pub fn enabled(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::Iso => self.iso,
            Dialect::Itunes => self.itunes,
            Dialect::Xmp => self.xmp,
        }
    }
}

/// Options for reading, editing and writing a file.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub dialects: Dialects,
    /// Reading or checking a file with more top-level atoms than this fails.
    pub max_top_level_atoms: usize,
    pub chunk_size: usize,
    pub brands: Vec<FourCC>,
    /// Class word written in front of wrapped text.
    pub text_flags: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            dialects: Dialects::default(),
            max_top_level_atoms: DEFAULT_MAX_TOP_LEVEL_ATOMS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            brands: DEFAULT_BRANDS.iter().copied().map(FourCC).collect(),
            text_flags: TEXT_FLAGS,
        }
    }
}

impl EngineOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dialects(mut self, dialects: Dialects) -> Self {
        self.dialects = dialects;
        self
    }

    pub fn with_max_top_level_atoms(mut self, max: usize) -> Self {
        self.max_top_level_atoms = max;
        self
    }

    /// A chunk size of zero is treated as one byte.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_brand(mut self, brand: FourCC) -> Self {
        if !self.brands.contains(&brand) {
            self.brands.push(brand);
        }
        self
    }

    pub fn with_text_flags(mut self, flags: u32) -> Self {
        self.text_flags = flags;
        self
    }

    pub fn accepts_brand(&self, brand: FourCC) -> bool {
        self.brands.contains(&brand)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.max_top_level_atoms, 1024);
        assert_eq!(options.chunk_size, 4096);
        assert_eq!(options.text_flags, 1);
        assert!(options.accepts_brand(FourCC(*b"qt  ")));
        assert!(!options.accepts_brand(FourCC(*b"avif")));
        assert!(options.dialects.enabled(Dialect::Xmp));
    }

    #[test]
    fn builders() {
        let options = EngineOptions::new()
            .with_brand(FourCC(*b"avif"))
            .with_brand(FourCC(*b"avif"))
            .with_chunk_size(0)
            .with_dialects(Dialects {
                itunes: false,
                ..Default::default()
            });
        assert!(options.accepts_brand(FourCC(*b"avif")));
        assert_eq!(options.brands.len(), DEFAULT_BRANDS.len() + 1);
        assert_eq!(options.chunk_size, 1);
        assert!(!options.dialects.enabled(Dialect::Itunes));
        assert!(options.dialects.enabled(Dialect::Iso));
    }
}
