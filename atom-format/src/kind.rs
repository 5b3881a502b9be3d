use std::fmt;

use crate::fourcc::FourCC;

pub mod constants {
    pub const FTYP: [u8; 4] = *b"ftyp";
    pub const FREE: [u8; 4] = *b"free";
    pub const MOOV: [u8; 4] = *b"moov";
    pub const MDAT: [u8; 4] = *b"mdat";
    pub const DATA: [u8; 4] = *b"data";
    pub const UDTA: [u8; 4] = *b"udta";
    pub const TITL: [u8; 4] = *b"titl";
    pub const LOCI: [u8; 4] = *b"loci";
    pub const META: [u8; 4] = *b"meta";
    pub const DSCP: [u8; 4] = *b"dscp";
    pub const AUTH: [u8; 4] = *b"auth";
    pub const XMP: [u8; 4] = *b"XMP_";
    pub const TRAK: [u8; 4] = *b"trak";
    pub const MVHD: [u8; 4] = *b"mvhd";
    pub const HDLR: [u8; 4] = *b"hdlr";
    pub const ILST: [u8; 4] = *b"ilst";
    pub const UUID: [u8; 4] = *b"uuid";
    pub const ITUNES_NAME: [u8; 4] = *b"\xa9nam";
    pub const ITUNES_COMMENT: [u8; 4] = *b"\xa9cmt";
    pub const ITUNES_ARTIST: [u8; 4] = *b"\xa9ART";
}

use self::constants::*;

/// How the body of an atom is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AtomKind {
    /// An opaque value with no children.
    Data,
    /// A body made entirely of child atoms.
    Container,
    /// A data prefix followed by child atoms, with no marker between them.
    Hybrid,
    /// Not in the name table; never dissected.
    Unknown,
    /// The synthetic tree root. Has no bytes of its own.
    Pseudo,
}

impl AtomKind {
    /// Whether the atom's own data contributes to its serialized form.
    #[inline(always)]
    pub fn keeps_data(self) -> bool {
        matches!(self, AtomKind::Data | AtomKind::Hybrid | AtomKind::Unknown)
    }

    /// Whether the atom's children contribute to its serialized form.
    #[inline(always)]
    pub fn keeps_children(self) -> bool {
        matches!(self, AtomKind::Container | AtomKind::Hybrid | AtomKind::Pseudo)
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AtomKind::Data => "data",
            AtomKind::Container => "container",
            AtomKind::Hybrid => "hybrid",
            AtomKind::Unknown => "unknown",
            AtomKind::Pseudo => "pseudo",
        };
        f.write_str(s)
    }
}

/// Where an atom's body lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Storage {
    #[default]
    Memory,
    /// Left in the source file and streamed on demand.
    File,
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Memory => f.write_str("memory"),
            Storage::File => f.write_str("file"),
        }
    }
}

/// Every name the engine knows how to dissect.
pub const KNOWN_ATOMS: &[([u8; 4], AtomKind, Storage)] = &[
    (FTYP, AtomKind::Data, Storage::Memory),
    (FREE, AtomKind::Data, Storage::Memory),
    (MOOV, AtomKind::Container, Storage::Memory),
    (MDAT, AtomKind::Data, Storage::File),
    (DATA, AtomKind::Data, Storage::Memory),
    (UDTA, AtomKind::Container, Storage::Memory),
    (TITL, AtomKind::Container, Storage::Memory),
    (LOCI, AtomKind::Data, Storage::Memory),
    (META, AtomKind::Hybrid, Storage::Memory),
    (DSCP, AtomKind::Container, Storage::Memory),
    (AUTH, AtomKind::Data, Storage::Memory),
    (XMP, AtomKind::Data, Storage::Memory),
    (TRAK, AtomKind::Container, Storage::Memory),
    (MVHD, AtomKind::Data, Storage::Memory),
    (HDLR, AtomKind::Data, Storage::Memory),
    (ILST, AtomKind::Container, Storage::Memory),
    (ITUNES_ARTIST, AtomKind::Container, Storage::Memory),
    (ITUNES_COMMENT, AtomKind::Container, Storage::Memory),
    (ITUNES_NAME, AtomKind::Container, Storage::Memory),
    (UUID, AtomKind::Data, Storage::Memory),
];

/// Looks up how an atom name is laid out and stored.
pub fn resolve(name: FourCC) -> (AtomKind, Storage) {
    KNOWN_ATOMS
        .iter()
        .find(|(known, _, _)| name == *known)
        .map(|(_, kind, storage)| (*kind, *storage))
        .unwrap_or((AtomKind::Unknown, Storage::Memory))
}

#[inline(always)]
pub fn is_known(name: &[u8]) -> bool {
    KNOWN_ATOMS.iter().any(|(known, _, _)| known == name)
}
