use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::sync::{Arc, Weak};

use memmap2::MmapOptions;
use serde_json::json;

use crate::{
    de::parse_header,
    error::EditError,
    fourcc::FourCC,
    header::{AtomHeader, PREAMBLE_SIZE},
    hybrid,
    kind::{self, AtomKind, Storage},
    ser::Serialize,
};

/// What an atom's bytes currently mean.
#[derive(Debug)]
pub enum Payload {
    /// Undissected bytes, preamble included. Whether they hold more data or
    /// children has not been decided yet.
    Raw(Vec<u8>),

    /// The atom's own data, with its children materialized separately.
    Analyzed { data: Vec<u8>, children: Vec<Atom> },

    /// The body was left in the source file.
    Deferred,
}

/// A node in an atom tree.
///
/// Atoms read from a file start out collapsed ([`Payload::Raw`] or
/// [`Payload::Deferred`]) and are dissected lazily by [`Atom::expand`]. Atoms
/// built by an edit start out analyzed.
pub struct Atom {
    name: FourCC,
    kind: AtomKind,
    storage: Storage,
    /// Declared size, preamble included, as read or as last collapsed. `None` for the root.
    original_size: Option<u32>,
    /// Offset of the preamble in the source file.
    location: Option<u64>,
    payload: Payload,
    /// Only set for file-backed atoms.
    source: Option<Weak<File>>,
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Atom");
        s.field("name", &self.name)
            .field("kind", &self.kind)
            .field("storage", &self.storage)
            .field("original_size", &self.original_size)
            .field("location", &self.location);
        match &self.payload {
            Payload::Raw(raw) => s.field("raw", &raw.len()),
            Payload::Analyzed { data, children } => {
                s.field("data", &data.len()).field("children", children)
            }
            Payload::Deferred => s.field("deferred", &true),
        };
        s.finish_non_exhaustive()
    }
}

impl Atom {
    /// The synthetic root that holds the top-level atoms of a file.
    pub fn root() -> Atom {
        Atom::root_of(vec![])
    }

    pub(crate) fn root_of(children: Vec<Atom>) -> Atom {
        Atom {
            name: FourCC(*b"root"),
            kind: AtomKind::Pseudo,
            storage: Storage::Memory,
            original_size: None,
            location: None,
            payload: Payload::Analyzed {
                data: vec![],
                children,
            },
            source: None,
        }
    }

    /// Builds an analyzed atom holding `data` and no children.
    pub fn new(name: FourCC, kind: AtomKind, data: Vec<u8>) -> Atom {
        let original_size = u32::try_from(PREAMBLE_SIZE + data.len()).ok();
        Atom {
            name,
            kind,
            storage: Storage::Memory,
            original_size,
            location: None,
            payload: Payload::Analyzed {
                data,
                children: vec![],
            },
            source: None,
        }
    }

    /// Wraps the complete bytes of one atom, preamble included, without dissecting them.
    ///
    /// Returns `None` if the declared size does not match the number of bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Option<Atom> {
        let header = parse_header(&bytes)?;
        if header.size as usize != bytes.len() {
            return None;
        }
        Some(Atom::raw(header, bytes, None))
    }

    pub(crate) fn raw(header: AtomHeader, bytes: Vec<u8>, location: Option<u64>) -> Atom {
        let (kind, _) = kind::resolve(header.name);
        Atom {
            name: header.name,
            kind,
            storage: Storage::Memory,
            original_size: Some(header.size),
            location,
            payload: Payload::Raw(bytes),
            source: None,
        }
    }

    pub(crate) fn deferred(header: AtomHeader, location: u64, source: &Arc<File>) -> Atom {
        let (kind, _) = kind::resolve(header.name);
        Atom {
            name: header.name,
            kind,
            storage: Storage::File,
            original_size: Some(header.size),
            location: Some(location),
            payload: Payload::Deferred,
            source: Some(Arc::downgrade(source)),
        }
    }

    #[inline(always)]
    pub fn name(&self) -> FourCC {
        self.name
    }

    #[inline(always)]
    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    #[inline(always)]
    pub fn storage(&self) -> Storage {
        self.storage
    }

    #[inline(always)]
    pub fn original_size(&self) -> Option<u32> {
        self.original_size
    }

    #[inline(always)]
    pub fn location(&self) -> Option<u64> {
        self.location
    }

    /// Records that the atom's bytes now start at `location` in its source.
    pub(crate) fn relocate(&mut self, location: u64) {
        self.location = Some(location);
    }

    #[inline(always)]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    #[inline(always)]
    pub fn is_collapsed(&self) -> bool {
        !matches!(self.payload, Payload::Analyzed { .. })
    }

    /// The atom's own data, once analyzed.
    pub fn data(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Analyzed { data, .. } => Some(data),
            _ => None,
        }
    }

    /// Materialized children. Empty while collapsed.
    pub fn children(&self) -> &[Atom] {
        match &self.payload {
            Payload::Analyzed { children, .. } => children,
            _ => &[],
        }
    }

    pub(crate) fn children_mut(&mut self) -> Option<&mut Vec<Atom>> {
        match &mut self.payload {
            Payload::Analyzed { children, .. } => Some(children),
            _ => None,
        }
    }

    /// Serialized size in bytes, preamble included. Computed on every call.
    pub fn size(&self) -> u64 {
        match &self.payload {
            // Raw bytes already carry their own preamble.
            Payload::Raw(raw) => raw.len() as u64,
            Payload::Deferred => self.original_size.map(u64::from).unwrap_or(0),
            Payload::Analyzed { data, children } => {
                let mut size = match self.kind {
                    AtomKind::Pseudo => 0,
                    _ => PREAMBLE_SIZE as u64,
                };
                if self.kind.keeps_data() {
                    size += data.len() as u64;
                }
                if self.kind.keeps_children() {
                    size += children.iter().map(Atom::size).sum::<u64>();
                }
                size
            }
        }
    }

    /// Tries to split a collapsed atom into its own data and children.
    ///
    /// Returns `true` if the atom is still collapsed afterwards. That is the
    /// permanent outcome for unknown and file-backed atoms, and the outcome
    /// for atoms whose bytes contradict their kind.
    pub fn expand(&mut self) -> bool {
        let raw = match &self.payload {
            Payload::Analyzed { .. } => return false,
            Payload::Deferred => return true,
            Payload::Raw(raw) => raw,
        };

        if self.kind == AtomKind::Pseudo {
            self.payload = Payload::Analyzed {
                data: vec![],
                children: vec![],
            };
            return false;
        }

        if raw.len() < PREAMBLE_SIZE {
            return true;
        }
        let body = &raw[PREAMBLE_SIZE..];
        let body_location = self.location.map(|x| x + PREAMBLE_SIZE as u64);

        let dissection = match self.kind {
            AtomKind::Data => {
                let declared = self.original_size.map(|x| x as usize);
                if declared == Some(PREAMBLE_SIZE + body.len()) {
                    Some((body.len(), vec![]))
                } else {
                    None
                }
            }
            AtomKind::Container => container_children(body, body_location).map(|c| (0, c)),
            AtomKind::Hybrid => hybrid::find_split(body).and_then(|split| {
                let location = body_location.map(|x| x + split as u64);
                parse_children(&body[split..], location).map(|c| (split, c))
            }),
            AtomKind::Unknown | AtomKind::Pseudo => None,
        };

        let (data_len, children) = match dissection {
            Some(v) => v,
            None => {
                tracing::debug!(name = %self.name, kind = %self.kind, "atom left collapsed");
                return true;
            }
        };

        let mut data = match std::mem::replace(&mut self.payload, Payload::Deferred) {
            Payload::Raw(raw) => raw,
            _ => unreachable!("payload checked above"),
        };
        data.truncate(PREAMBLE_SIZE + data_len);
        data.drain(..PREAMBLE_SIZE);

        tracing::debug!(
            name = %self.name,
            data = data.len(),
            children = children.len(),
            "expanded atom"
        );

        self.payload = Payload::Analyzed { data, children };
        false
    }

    /// Expands this atom and every descendant that can be expanded.
    pub fn expand_all(&mut self) {
        self.expand();
        if let Some(children) = self.children_mut() {
            children.iter_mut().for_each(Atom::expand_all);
        }
    }

    /// Serializes the atom into a single raw byte blob and drops its children.
    ///
    /// File-backed atoms are left untouched: their bytes never enter memory.
    pub fn collapse(&mut self) -> std::io::Result<()> {
        if !matches!(self.payload, Payload::Analyzed { .. }) || self.kind == AtomKind::Pseudo {
            return Ok(());
        }

        let mut buf = Vec::with_capacity(self.size() as usize);
        self.write(&mut buf)?;
        // The preamble just written declares the new size.
        self.original_size = u32::try_from(buf.len()).ok();
        self.payload = Payload::Raw(buf);
        Ok(())
    }

    /// Serializes the atom without changing it.
    pub fn to_bytes(&self) -> std::io::Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.size() as usize);
        self.write(&mut buf)?;
        Ok(buf)
    }

    /// Replaces the atom's content with `data`, leaving it analyzed with no children.
    ///
    /// The bytes now live in memory, so a file-backed atom becomes memory-backed.
    pub fn set_data(&mut self, data: Vec<u8>) {
        self.expand();
        self.storage = Storage::Memory;
        self.source = None;
        self.payload = Payload::Analyzed {
            data,
            children: vec![],
        };
    }

    /// Reads `len` bytes starting `offset` bytes into the atom.
    ///
    /// File-backed atoms are read straight from the source file, with offsets
    /// counted from the start of the preamble. Memory atoms slice their payload.
    pub fn data_chunk(&self, offset: u64, len: usize) -> std::io::Result<Vec<u8>> {
        let bytes = match &self.payload {
            Payload::Deferred => {
                let file = self.source_file()?;
                let location = self.location.unwrap_or_default();
                let mut file: &File = &file;
                file.seek(SeekFrom::Start(location + offset))?;
                let mut buf = vec![0u8; len];
                file.read_exact(&mut buf)?;
                return Ok(buf);
            }
            Payload::Raw(raw) => raw,
            Payload::Analyzed { data, .. } => data,
        };

        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        start
            .checked_add(len)
            .and_then(|end| bytes.get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!("chunk {}+{} is outside atom `{}`", offset, len, self.name),
                )
            })
    }

    /// Maps the body of a file-backed atom into memory.
    ///
    /// # Safety
    ///
    /// The source file must not be modified while the map is alive.
    pub unsafe fn memory_map(&self) -> std::io::Result<memmap2::Mmap> {
        let file = self.source_file()?;
        let location = self.location.unwrap_or_default();
        let len = self
            .original_size
            .map(|x| x as usize)
            .unwrap_or_default()
            .saturating_sub(PREAMBLE_SIZE);
        MmapOptions::new()
            .offset(location + PREAMBLE_SIZE as u64)
            .len(len)
            .map(&*file)
    }

    fn source_file(&self) -> std::io::Result<Arc<File>> {
        self.source.as_ref().and_then(Weak::upgrade).ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source file of atom `{}` is closed", self.name),
            )
        })
    }

    /// Appends a child, expanding this atom first if needed.
    pub fn add_child(&mut self, child: Atom) -> Result<&mut Atom, EditError> {
        let name = self.name;
        if self.expand() {
            return Err(EditError::NotAnalyzed(name));
        }
        let children = self.children_mut().ok_or(EditError::NotAnalyzed(name))?;
        let index = children.len();
        children.push(child);
        Ok(&mut children[index])
    }

    /// Removes the first child called `name`.
    pub fn remove_child(&mut self, name: FourCC) -> Option<Atom> {
        let index = self.child_index(name)?;
        self.children_mut().map(|children| children.remove(index))
    }

    pub fn has_child(&mut self, name: FourCC) -> bool {
        self.child_index(name).is_some()
    }

    /// Position of the first child called `name`, expanding this atom first if needed.
    pub fn child_index(&mut self, name: FourCC) -> Option<usize> {
        self.expand();
        self.children().iter().position(|c| c.name == name)
    }

    pub fn child(&self, name: FourCC) -> Option<&Atom> {
        self.children().iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: FourCC) -> Option<&mut Atom> {
        let index = self.child_index(name)?;
        self.children_mut()?.get_mut(index)
    }

    /// Describes the tree below this atom as it is currently dissected.
    pub fn describe(&self) -> serde_json::Value {
        let children: Vec<_> = self.children().iter().map(Atom::describe).collect();
        json!({
            "name": self.name.to_string(),
            "kind": self.kind.to_string(),
            "storage": self.storage.to_string(),
            "size": self.size(),
            "offset": self.location,
            "collapsed": self.is_collapsed(),
            "children": children,
        })
    }
}

/// Parses a container body, refusing it early when the first size cannot fit.
fn container_children(body: &[u8], location: Option<u64>) -> Option<Vec<Atom>> {
    if let Some(first) = body.get(0..4) {
        let first = u32::from_be_bytes([first[0], first[1], first[2], first[3]]);
        if first as usize > body.len() {
            return None;
        }
    }
    parse_children(body, location)
}

/// Splits `body` into consecutive child atoms. Any malformed record fails the whole body.
fn parse_children(body: &[u8], location: Option<u64>) -> Option<Vec<Atom>> {
    let mut children = vec![];
    let mut pos = 0;
    while pos < body.len() {
        let header = parse_header(&body[pos..])?;
        let size = header.size as usize;
        if size < PREAMBLE_SIZE || size > body.len() - pos {
            return None;
        }
        let child_location = location.map(|x| x + pos as u64);
        children.push(Atom::raw(
            header,
            body[pos..pos + size].to_vec(),
            child_location,
        ));
        pos += size;
    }
    Some(children)
}
