use std::path::PathBuf;

use atom_format::path::IntoAtomPathError;
use atom_format::{AtomPath, OpenError, TagError, WriteError};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot open file `{}`", .path.display())]
    OpenFile {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    #[error("Cannot safely edit `{}`", .path.display())]
    Unsupported {
        path: PathBuf,
        #[source]
        source: OpenError,
    },

    #[error("Cannot handle atom path `{path}`")]
    InvalidPath {
        path: String,
        #[source]
        source: IntoAtomPathError,
    },

    #[error("No atom at `{0}`")]
    NotFound(AtomPath),

    #[error("Cannot update {tag}")]
    Tag {
        tag: &'static str,
        #[source]
        source: TagError,
    },

    #[error("Cannot write file `{}`", .path.display())]
    WriteFile {
        path: PathBuf,
        #[source]
        source: WriteError,
    },

    #[error("Nothing to do; pass at least one tag option.")]
    NothingToDo,
}
