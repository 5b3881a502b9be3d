use crate::fourcc::FourCC;

/// Size of the `(size, name)` prefix of every atom.
pub const PREAMBLE_SIZE: usize = 8;

/// Size field value announcing a 64-bit size after the name. Unsupported.
pub const EXTENDED_SIZE: u32 = 1;

/// Size field value announcing that the atom runs to the end of the file.
pub const TO_END_OF_FILE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtomHeader {
    pub size: u32,
    pub name: FourCC,
}

impl AtomHeader {
    pub const SIZE: usize = PREAMBLE_SIZE;

    pub fn new(size: u32, name: FourCC) -> AtomHeader {
        AtomHeader { size, name }
    }

    #[inline(always)]
    pub fn is_extended(&self) -> bool {
        self.size == EXTENDED_SIZE
    }

    /// Length of the body following the preamble, when the size is a plain 32-bit one.
    #[inline(always)]
    pub fn body_len(&self) -> Option<u32> {
        self.size.checked_sub(PREAMBLE_SIZE as u32)
    }
}
