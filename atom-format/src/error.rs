use std::fmt;
use std::path::PathBuf;

use crate::fourcc::FourCC;
use crate::path::AtomPath;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("No input file has been set.")]
    NoInput,

    #[error("Failed to read file. Path: '{}'", .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),

    #[error("Atom `{0}` at {1:#x} uses a 64-bit size, which is not supported.")]
    ExtendedSize(FourCC, u64),

    #[error("Atom `{0}` at {1:#x} declares an impossible size of {2} bytes.")]
    InvalidSize(FourCC, u64, u32),

    #[error("File does not start with an `ftyp` atom.")]
    MissingFileType,

    #[error("Brand `{0}` is not supported.")]
    UnsupportedBrand(FourCC),

    #[error("File has no `moov` atom.")]
    MissingMetadata,

    #[error("File has no `mdat` atom.")]
    MissingPayload,

    #[error("`moov` at {0:#x} is not placed before `mdat` at {1:#x}; editing would break sample offsets.")]
    MetadataAfterPayload(u64, u64),

    #[error("Gave up after {0} top-level atoms.")]
    TooManyAtoms(usize),

    #[error("{0} bytes at the end of the file do not form an atom.")]
    TrailingData(u64),
}

#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Atom not found. Path: '{0}'")]
    NotFound(AtomPath),

    #[error("Atom `{0}` could not be dissected into data and children.")]
    NotAnalyzed(FourCC),

    #[error("Atom names must be exactly four bytes, got {0:?}.")]
    InvalidName(Vec<u8>),
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("No input file has been read.")]
    NoInput,

    #[error("No output file has been set.")]
    NoOutput,

    #[error("Creating output failed. Path: '{}'", .1.display())]
    CreateFailed(#[source] std::io::Error, PathBuf),

    #[error("Writing atom `{1}` failed.")]
    AtomFailed(#[source] std::io::Error, FourCC),

    #[error("Source file for atom `{0}` has already been closed.")]
    SourceClosed(FourCC),

    #[error("Finishing output failed. Path: '{}'", .1.display())]
    FinishFailed(#[source] std::io::Error, PathBuf),
}

/// Failure reported by an external XMP store.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct XmpError(pub String);

/// A metadata flavour that can be written into the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// 3GPP user data under `moov.udta.meta`.
    Iso,
    /// Apple item list under `moov.udta.meta.ilst`.
    Itunes,
    /// An XMP packet handed to an external store.
    Xmp,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Iso => f.write_str("iso"),
            Dialect::Itunes => f.write_str("itunes"),
            Dialect::Xmp => f.write_str("xmp"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("No file has been read yet.")]
    NotLoaded,

    #[error("None of the enabled dialects can store this tag.")]
    NoDialect,

    #[error("Invalid GPS position")]
    Gps(#[from] crate::tags::ParseGpsError),

    #[error("Updating metadata failed for: {}", DisplayList(.0))]
    Dialects(Vec<Dialect>),
}

struct DisplayList<'a>(&'a [Dialect]);

impl fmt::Display for DisplayList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, dialect) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", dialect)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_failed_dialects() {
        let err = TagError::Dialects(vec![Dialect::Iso, Dialect::Xmp]);
        assert_eq!(err.to_string(), "Updating metadata failed for: iso, xmp");
    }
}
