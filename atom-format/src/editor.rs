//! Path-addressed lookup and mutation of atom trees.

use byteorder::{BigEndian, WriteBytesExt};

use crate::{
    atom::Atom,
    error::EditError,
    fourcc::FourCC,
    kind::{self, constants::*, AtomKind},
    path::AtomPath,
};

/// Version and flags every newly created `meta` atom starts with.
const META_VERSION_FLAGS: [u8; 4] = [0; 4];

/// How [`Atom::set_atom_data`] lays out the content it writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Writes into a child `data` atom, prefixed with the class/flags word
    /// and four reserved zero bytes.
    Wrapped { flags: u32 },
    /// Writes the content as the atom's own data, unprefixed.
    Direct,
}

impl Atom {
    /// Finds the atom at `path` below this one, expanding every atom visited,
    /// the one found included.
    ///
    /// Where several siblings share a name, the first one is followed.
    pub fn find_atom(&mut self, path: &AtomPath) -> Option<&mut Atom> {
        self.resolve_atom(path).ok()
    }

    /// Like [`Atom::find_atom`], but tells a missing atom apart from an
    /// ancestor that could not be dissected.
    pub fn resolve_atom(&mut self, path: &AtomPath) -> Result<&mut Atom, EditError> {
        let mut node = self;
        for name in path.iter() {
            if node.expand() {
                return Err(EditError::NotAnalyzed(node.name()));
            }
            let index = node
                .children()
                .iter()
                .position(|c| c.name() == *name)
                .ok_or_else(|| EditError::NotFound(path.clone()))?;
            node = node
                .children_mut()
                .and_then(|children| children.get_mut(index))
                .ok_or(EditError::NotAnalyzed(*name))?;
        }
        // Leaves that cannot be dissected are still returned; their bytes stay raw.
        node.expand();
        Ok(node)
    }

    /// Walks `path` like [`Atom::find_atom`], creating every missing atom on the way.
    ///
    /// Returns the deepest atom of the path.
    pub fn ensure_atom_hierarchy(&mut self, path: &AtomPath) -> Result<&mut Atom, EditError> {
        let mut node = self;
        for name in path.iter() {
            let index = match node.child_index(*name) {
                Some(index) => index,
                None => {
                    tracing::debug!(%name, parent = %node.name(), "creating missing atom");
                    node.add_child(new_intermediate(*name))?;
                    node.children().len() - 1
                }
            };
            node = node
                .children_mut()
                .and_then(|children| children.get_mut(index))
                .ok_or(EditError::NotAnalyzed(*name))?;
        }
        Ok(node)
    }

    /// Creates an analyzed atom called `name` holding `content` and appends it to this atom.
    pub fn create_atom(
        &mut self,
        name: &[u8],
        kind: AtomKind,
        content: Vec<u8>,
    ) -> Result<&mut Atom, EditError> {
        let name = FourCC::exact(name).ok_or_else(|| EditError::InvalidName(name.to_vec()))?;
        self.add_child(Atom::new(name, kind, content))
    }

    /// Removes the atom at `path` from its parent and returns it.
    ///
    /// Nothing is removed when the path does not resolve.
    pub fn delete_atom(&mut self, path: &AtomPath) -> Result<Atom, EditError> {
        let parent = match path.parent() {
            Some(parent) => self.resolve_atom(&parent)?,
            None => self,
        };
        if parent.expand() {
            return Err(EditError::NotAnalyzed(parent.name()));
        }
        let removed = parent
            .remove_child(path.name())
            .ok_or_else(|| EditError::NotFound(path.clone()))?;
        tracing::debug!(%path, "deleted atom");
        Ok(removed)
    }

    /// Stores `content` at `path`, creating the atom and its ancestors if needed.
    pub fn set_atom_data(
        &mut self,
        content: &[u8],
        path: &AtomPath,
        mode: DataMode,
    ) -> Result<(), EditError> {
        let (path, bytes) = match mode {
            DataMode::Wrapped { flags } => {
                let mut bytes = Vec::with_capacity(8 + content.len());
                // Writing into a Vec cannot fail.
                let _ = bytes.write_u32::<BigEndian>(flags);
                let _ = bytes.write_u32::<BigEndian>(0);
                bytes.extend_from_slice(content);
                (path.join(FourCC(DATA)), bytes)
            }
            DataMode::Direct => (path.clone(), content.to_vec()),
        };

        match self.resolve_atom(&path) {
            Ok(atom) => {
                atom.set_data(bytes);
                return Ok(());
            }
            Err(EditError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let parent = match path.parent() {
            Some(parent) => self.ensure_atom_hierarchy(&parent)?,
            None => self,
        };
        let name = path.name();
        let (kind, _) = kind::resolve(name);
        parent.create_atom(name.as_bytes(), kind, bytes)?;
        tracing::debug!(%path, "created atom");
        Ok(())
    }
}

/// Builds an empty ancestor for [`Atom::ensure_atom_hierarchy`].
///
/// `meta` always carries its version/flags word. Names outside the table
/// become containers, since they are created to hold a child.
fn new_intermediate(name: FourCC) -> Atom {
    if name == META {
        return Atom::new(name, AtomKind::Hybrid, META_VERSION_FLAGS.to_vec());
    }
    let kind = match kind::resolve(name).0 {
        AtomKind::Unknown => AtomKind::Container,
        kind => kind,
    };
    Atom::new(name, kind, vec![])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> AtomPath {
        AtomPath::new(s).unwrap()
    }

    fn atom_bytes(name: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(name);
        out.extend_from_slice(body);
        out
    }

    fn tree_with_moov() -> Atom {
        let mut root = Atom::root();
        let udta = atom_bytes(b"udta", &atom_bytes(b"auth", b"someone"));
        let mut moov_body = atom_bytes(b"mvhd", &[0; 8]);
        moov_body.extend(udta);
        root.add_child(Atom::from_bytes(atom_bytes(b"moov", &moov_body)).unwrap())
            .unwrap();
        root
    }

    #[test]
    fn finds_nested_atom() {
        let mut root = tree_with_moov();
        let auth = root.find_atom(&path("moov.udta.auth")).unwrap();
        assert_eq!(auth.name(), *b"auth");
        assert_eq!(auth.data().unwrap(), b"someone");
    }

    #[test]
    fn missing_segment_is_not_found() {
        let mut root = tree_with_moov();
        assert!(root.find_atom(&path("moov.trak")).is_none());
        assert!(root.find_atom(&path("moov.udta.auth.data")).is_none());
    }

    #[test]
    fn ensure_creates_missing_ancestors() {
        let mut root = Atom::root();
        let leaf = root
            .ensure_atom_hierarchy(&path("moov.udta.meta.ilst"))
            .unwrap();
        assert_eq!(leaf.name(), *b"ilst");
        assert_eq!(leaf.kind(), AtomKind::Container);

        let meta = root.find_atom(&path("moov.udta.meta")).unwrap();
        assert_eq!(meta.data().unwrap(), &[0, 0, 0, 0]);
        assert_eq!(meta.children().len(), 1);
        assert_eq!(meta.size(), 8 + 4 + 8);
    }

    #[test]
    fn ensure_reuses_existing_atoms() {
        let mut root = tree_with_moov();
        root.ensure_atom_hierarchy(&path("moov.udta.loci")).unwrap();
        let udta = root.find_atom(&path("moov.udta")).unwrap();
        let names: Vec<_> = udta.children().iter().map(|c| c.name()).collect();
        assert_eq!(names, vec![FourCC(AUTH), FourCC(LOCI)]);
        assert_eq!(root.children().len(), 1);
    }

    #[test]
    fn unregistered_intermediates_hold_children() {
        let mut root = Atom::root();
        root.ensure_atom_hierarchy(&path("moov.zzzz.data")).unwrap();
        let zzzz = root.find_atom(&path("moov.zzzz")).unwrap();
        assert_eq!(zzzz.kind(), AtomKind::Container);
        assert_eq!(zzzz.size(), 16);
    }

    #[test]
    fn create_rejects_bad_names() {
        let mut root = Atom::root();
        assert!(matches!(
            root.create_atom(b"abc", AtomKind::Data, vec![]),
            Err(EditError::InvalidName(_))
        ));
        let atom = root.create_atom(b"free", AtomKind::Data, vec![1, 2]).unwrap();
        assert_eq!(atom.original_size(), Some(10));
        assert!(!atom.is_collapsed());
    }

    #[test]
    fn wrapped_mode_prefixes_flags() {
        let mut root = Atom::root();
        root.set_atom_data(b"X", &path("moov.udta.meta.titl"), DataMode::Wrapped { flags: 1 })
            .unwrap();
        let data = root.find_atom(&path("moov.udta.meta.titl.data")).unwrap();
        assert_eq!(data.data().unwrap(), b"\x00\x00\x00\x01\x00\x00\x00\x00X");
    }

    #[test]
    fn direct_mode_writes_content_verbatim() {
        let mut root = Atom::root();
        root.set_atom_data(b"A,B,C", &path("moov.udta.meta.loci"), DataMode::Direct)
            .unwrap();
        let loci = root.find_atom(&path("moov.udta.meta.loci")).unwrap();
        assert_eq!(loci.data().unwrap(), b"A,B,C");
        assert_eq!(loci.kind(), AtomKind::Data);
    }

    #[test]
    fn set_overwrites_existing_atom() {
        let mut root = tree_with_moov();
        root.set_atom_data(b"other", &path("moov.udta.auth"), DataMode::Direct)
            .unwrap();
        let udta = root.find_atom(&path("moov.udta")).unwrap();
        assert_eq!(udta.children().len(), 1);
        assert_eq!(udta.children()[0].data().unwrap(), b"other");
    }

    #[test]
    fn missing_meta_is_seeded_with_version_only() {
        let mut root = tree_with_moov();
        root.set_atom_data(
            b"x",
            &path("moov.udta.meta.ilst.©nam"),
            DataMode::Wrapped { flags: 1 },
        )
        .unwrap();
        let meta = root.find_atom(&path("moov.udta.meta")).unwrap();
        assert_eq!(meta.data().unwrap(), &[0, 0, 0, 0]);
        let ilst = &meta.children()[0];
        assert_eq!(ilst.name(), *b"ilst");
        assert_eq!(ilst.children()[0].name(), *b"\xa9nam");
    }

    #[test]
    fn delete_removes_first_match() {
        let mut root = tree_with_moov();
        let removed = root.delete_atom(&path("moov.udta")).unwrap();
        assert_eq!(removed.name(), *b"udta");
        assert!(root.find_atom(&path("moov.udta")).is_none());
        assert!(root.find_atom(&path("moov.mvhd")).is_some());
    }

    #[test]
    fn deleting_missing_path_changes_nothing() {
        let mut root = tree_with_moov();
        let before = root.to_bytes().unwrap();
        assert!(matches!(
            root.delete_atom(&path("moov.trak.mdia")),
            Err(EditError::NotFound(p)) if p == path("moov.trak.mdia")
        ));
        assert!(matches!(
            root.delete_atom(&path("moov.udta.titl")),
            Err(EditError::NotFound(_))
        ));
        assert!(matches!(root.delete_atom(&path("ftyp")), Err(EditError::NotFound(_))));
        assert_eq!(root.to_bytes().unwrap(), before);
    }

    /// `udta` holding `meta` plus three stray bytes cannot be split into children.
    fn tree_with_broken_udta() -> Atom {
        let mut meta = vec![0, 0, 0, 0];
        meta.extend(atom_bytes(b"titl", &atom_bytes(b"data", b"Secret")));
        let mut udta = atom_bytes(b"meta", &meta);
        udta.extend_from_slice(&[1, 2, 3]);

        let mut root = Atom::root();
        root.add_child(Atom::from_bytes(atom_bytes(b"moov", &atom_bytes(b"udta", &udta))).unwrap())
            .unwrap();
        root
    }

    #[test]
    fn found_leaf_is_expanded() {
        let mut root = tree_with_moov();
        let auth = root.resolve_atom(&path("moov.udta.auth")).unwrap();
        assert!(!auth.is_collapsed());
        assert_eq!(auth.data().unwrap(), b"someone");
    }

    #[test]
    fn collapsed_ancestor_blocks_the_walk() {
        let mut root = tree_with_broken_udta();
        let before = root.to_bytes().unwrap();

        assert!(matches!(
            root.resolve_atom(&path("moov.udta.meta.titl")),
            Err(EditError::NotAnalyzed(name)) if name == *b"udta"
        ));
        assert!(matches!(
            root.delete_atom(&path("moov.udta.meta.titl")),
            Err(EditError::NotAnalyzed(_))
        ));
        assert!(matches!(
            root.set_atom_data(b"x", &path("moov.udta.meta.titl"), DataMode::Wrapped { flags: 1 }),
            Err(EditError::NotAnalyzed(_))
        ));
        assert!(root.find_atom(&path("moov.udta.meta")).is_none());
        assert_eq!(root.to_bytes().unwrap(), before);

        // The collapsed atom itself can still be removed whole.
        assert_eq!(root.delete_atom(&path("moov.udta")).unwrap().name(), *b"udta");
    }
}
