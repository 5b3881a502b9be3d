mod atom;
mod de;
mod editor;
mod error;
mod file;
mod fourcc;
mod handler;
mod header;
pub mod hybrid;
pub mod kind;
mod options;
pub mod path;
mod ser;
pub mod tags;
pub mod xmp;

pub use atom::{Atom, Payload};
pub use editor::DataMode;
pub use error::{Dialect, EditError, OpenError, TagError, WriteError, XmpError};
pub use file::{reader::Layout, Mp4File};
pub use fourcc::FourCC;
pub use handler::MetadataHandler;
pub use header::AtomHeader;
pub use kind::{AtomKind, Storage};
pub use options::{Dialects, EngineOptions};
pub use path::AtomPath;
pub use tags::{Geotag, GpsPosition, ParseGpsError};
pub use xmp::XmpHandler;

#[doc(hidden)]
pub use memmap2;
