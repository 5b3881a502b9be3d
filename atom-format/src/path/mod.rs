use std::fmt;
use std::str::FromStr;

use crate::fourcc::FourCC;

mod error;

pub use self::error::IntoAtomPathError;

/// The separator between names in an [`AtomPath`].
pub const PATH_ATOM_SEP: char = '.';

/// A root-relative chain of atom names, such as `moov.udta.meta.titl.data`.
///
/// A path is never empty and every segment is exactly four bytes.
#[derive(Debug, Clone, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AtomPath(pub(crate) Vec<FourCC>);

impl AtomPath {
    pub fn new<S: AsRef<str>>(path: S) -> Result<AtomPath, IntoAtomPathError> {
        let path = path.as_ref();
        if path.is_empty() {
            return Err(IntoAtomPathError::EmptyPath);
        }

        path.split(PATH_ATOM_SEP)
            .map(|segment| {
                if segment.is_empty() {
                    return Err(IntoAtomPathError::EmptySegment);
                }
                FourCC::parse(segment)
                    .ok_or_else(|| IntoAtomPathError::InvalidName(segment.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(AtomPath)
    }

    pub fn from_names<I: IntoIterator<Item = FourCC>>(
        names: I,
    ) -> Result<AtomPath, IntoAtomPathError> {
        let names: Vec<_> = names.into_iter().collect();
        if names.is_empty() {
            return Err(IntoAtomPathError::EmptyPath);
        }
        Ok(AtomPath(names))
    }

    pub fn parent(&self) -> Option<AtomPath> {
        if self.0.len() == 1 {
            return None;
        }
        Some(AtomPath(self.0[..self.0.len() - 1].to_vec()))
    }

    /// The last name in the path.
    pub fn name(&self) -> FourCC {
        // Never empty by construction.
        self.0[self.0.len() - 1]
    }

    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    pub fn starts_with(&self, other: &AtomPath) -> bool {
        self.0.starts_with(&other.0)
    }

    pub fn join(&self, name: FourCC) -> AtomPath {
        let mut names = self.0.clone();
        names.push(name);
        AtomPath(names)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FourCC> {
        self.0.iter()
    }
}

impl FromStr for AtomPath {
    type Err = IntoAtomPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AtomPath::new(s)
    }
}

impl fmt::Display for AtomPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iter = self.0.iter();
        if let Some(v) = iter.next() {
            write!(f, "{}", v)?;
        }
        for v in iter {
            write!(f, "{}{}", PATH_ATOM_SEP, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_path() {
        let path = AtomPath::new("moov.udta.meta.titl.data").unwrap();
        assert_eq!(path.depth(), 4);
        assert_eq!(path.name(), *b"data");
        assert_eq!(path.to_string(), "moov.udta.meta.titl.data");
    }

    #[test]
    fn parses_itunes_names() {
        let path = AtomPath::new("moov.udta.meta.ilst.©nam.data").unwrap();
        assert_eq!(path.iter().nth(4).unwrap(), &FourCC(*b"\xa9nam"));
    }

    #[test]
    fn parent_and_join() {
        let path = AtomPath::new("moov.udta").unwrap();
        assert_eq!(path.parent().unwrap().to_string(), "moov");
        assert!(path.parent().unwrap().parent().is_none());
        assert_eq!(path.join(FourCC(*b"loci")).to_string(), "moov.udta.loci");
        assert!(path.join(FourCC(*b"loci")).starts_with(&path));
    }

    #[test]
    fn rejects_empty_paths() {
        assert!(matches!(AtomPath::new(""), Err(IntoAtomPathError::EmptyPath)));
        assert!(matches!(
            AtomPath::new("moov..udta"),
            Err(IntoAtomPathError::EmptySegment)
        ));
        assert!(AtomPath::from_names(vec![]).is_err());
    }

    #[test]
    fn rejects_wrong_length_names() {
        let err = AtomPath::new("moov.ud").unwrap_err();
        assert!(matches!(err, IntoAtomPathError::InvalidName(ref s) if s == "ud"));
    }
}
