use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::{
    atom::Atom, kind::Storage, options::EngineOptions, xmp::XmpHandler, xmp::XmpLocation,
};

pub mod reader;
pub mod tags;
pub mod writer;

/// An MP4/3GP/QuickTime file, read into an atom tree and written back out.
///
/// Only the top-level atoms are read up front. Memory-backed ones keep their
/// raw bytes and are dissected on first use; the payload atom stays in the
/// source file, which is held open until the `Mp4File` is dropped.
pub struct Mp4File {
    pub(crate) input: Option<PathBuf>,
    pub(crate) output: Option<PathBuf>,
    pub(crate) source: Option<Arc<File>>,
    pub(crate) root: Option<Atom>,
    pub(crate) options: EngineOptions,
    pub(crate) xmp: Option<Box<dyn XmpHandler>>,
    /// Where the loaded XMP packet goes back to. `None` until the store has been fed.
    pub(crate) xmp_location: Option<XmpLocation>,
}

impl std::fmt::Debug for Mp4File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mp4File")
            .field("input", &self.input)
            .field("output", &self.output)
            .field("root", &self.root)
            .field("options", &self.options)
            .field("xmp", &self.xmp.is_some())
            .finish_non_exhaustive()
    }
}

impl Default for Mp4File {
    fn default() -> Self {
        Mp4File::new(EngineOptions::default())
    }
}

impl Mp4File {
    pub fn new(options: EngineOptions) -> Mp4File {
        Mp4File {
            input: None,
            output: None,
            source: None,
            root: None,
            options,
            xmp: None,
            xmp_location: None,
        }
    }

    /// Attaches the store the XMP dialect talks to.
    pub fn with_xmp_handler(mut self, handler: Box<dyn XmpHandler>) -> Mp4File {
        self.xmp = Some(handler);
        self.xmp_location = None;
        self
    }

    pub fn set_input_file<P: AsRef<Path>>(&mut self, path: P) {
        self.input = Some(path.as_ref().to_path_buf());
    }

    /// Sets where [`Mp4File::write_file`] writes to. Set it before reading when
    /// it is the input path, so the source is opened for writing as well.
    pub fn set_output_file<P: AsRef<Path>>(&mut self, path: P) {
        self.output = Some(path.as_ref().to_path_buf());
    }

    #[inline(always)]
    pub fn input_file(&self) -> Option<&Path> {
        self.input.as_deref()
    }

    #[inline(always)]
    pub fn output_file(&self) -> Option<&Path> {
        self.output.as_deref()
    }

    #[inline(always)]
    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// The pseudo-root holding the top-level atoms, once read.
    #[inline(always)]
    pub fn root(&self) -> Option<&Atom> {
        self.root.as_ref()
    }

    #[inline(always)]
    pub fn root_mut(&mut self) -> Option<&mut Atom> {
        self.root.as_mut()
    }

    /// Whether output goes back into the file that was read.
    pub fn is_in_place(&self) -> bool {
        match (&self.input, &self.output) {
            (Some(input), Some(output)) => same_file(input, output),
            _ => false,
        }
    }

    /// Describes the whole tree, dissecting every atom that can be dissected.
    pub fn describe(&mut self) -> Option<serde_json::Value> {
        let root = self.root.as_mut()?;
        root.expand_all();
        Some(root.describe())
    }

    /// Maps the body of the first file-backed atom, normally `mdat`.
    ///
    /// # Safety
    ///
    /// The source file must not be modified while the map is alive, which
    /// includes writing this `Mp4File` in place.
    pub unsafe fn memory_map_payload(&self) -> std::io::Result<Option<memmap2::Mmap>> {
        let atom = self
            .root
            .iter()
            .flat_map(|root| root.children())
            .find(|atom| atom.storage() == Storage::File);
        match atom {
            Some(atom) => atom.memory_map().map(Some),
            None => Ok(None),
        }
    }
}

pub(crate) fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
