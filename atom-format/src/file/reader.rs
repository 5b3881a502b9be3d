use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use super::Mp4File;
use crate::{
    atom::Atom,
    de::DeserializeOwned,
    error::OpenError,
    fourcc::FourCC,
    header::{AtomHeader, PREAMBLE_SIZE, TO_END_OF_FILE},
    kind::{self, constants::*, Storage},
    options::EngineOptions,
    ser::Serialize,
};

/// What [`Mp4File::able_to_process`] found out about a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub brand: FourCC,
    pub atoms: usize,
    /// Offset of the first `moov` atom.
    pub metadata: u64,
    /// Offset of the first `mdat` atom.
    pub payload: u64,
}

impl Mp4File {
    /// Reads the file at `path` with default options.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Mp4File, OpenError> {
        let mut file = Mp4File::default();
        file.set_input_file(path);
        file.read_file()?;
        Ok(file)
    }

    /// Reads the top-level atoms of the input file into a fresh tree.
    ///
    /// Memory-backed atoms are read whole but left undissected. File-backed
    /// ones are only located; the source stays open to stream them later.
    pub fn read_file(&mut self) -> Result<(), OpenError> {
        let path = self.input.clone().ok_or(OpenError::NoInput)?;
        let in_place = self.is_in_place();

        let file = OpenOptions::new()
            .read(true)
            .write(in_place)
            .open(&path)
            .map_err(|e| OpenError::ReadFailed(e, path.clone()))?;
        let len = file
            .metadata()
            .map_err(|e| OpenError::ReadFailed(e, path.clone()))?
            .len();
        let file = Arc::new(file);

        let mut reader = BufReader::new(&*file);
        let atoms = read_atoms(&mut reader, len, &file, &self.options, &path)?;
        tracing::debug!(path = %path.display(), atoms = atoms.len(), in_place, "read file");

        self.root = Some(Atom::root_of(atoms));
        self.source = Some(file);
        self.xmp_location = None;
        Ok(())
    }

    /// Checks that the input file can be edited without breaking it.
    ///
    /// The file must start with `ftyp` naming a known brand, consist of
    /// nothing but plain 32-bit atoms and have its `moov` before its `mdat`,
    /// since sample offsets into `mdat` are never rewritten.
    pub fn able_to_process(&self) -> Result<Layout, OpenError> {
        let path = self.input.as_ref().ok_or(OpenError::NoInput)?;
        let file = File::open(path).map_err(|e| OpenError::ReadFailed(e, path.clone()))?;
        let len = file
            .metadata()
            .map_err(|e| OpenError::ReadFailed(e, path.clone()))?
            .len();

        let layout = scan_layout(&mut BufReader::new(file), len, &self.options, path)?;
        tracing::debug!(
            brand = %layout.brand,
            atoms = layout.atoms,
            metadata = format_args!("{:#x}", layout.metadata),
            payload = format_args!("{:#x}", layout.payload),
            "file can be processed"
        );
        Ok(layout)
    }
}

/// Reads and validates the preamble of the top-level atom at `pos`.
///
/// A size of zero is resolved to the rest of the file.
fn header_at<R: Read + Seek>(
    reader: &mut R,
    pos: u64,
    len: u64,
    path: &Path,
) -> Result<AtomHeader, OpenError> {
    let remaining = len - pos;
    if remaining < PREAMBLE_SIZE as u64 {
        return Err(OpenError::TrailingData(remaining));
    }

    let mut header = reader
        .seek(SeekFrom::Start(pos))
        .and_then(|_| AtomHeader::deserialize_owned(reader))
        .map_err(|e| OpenError::ReadFailed(e, path.to_path_buf()))?;

    if header.is_extended() {
        return Err(OpenError::ExtendedSize(header.name, pos));
    }
    if header.size == TO_END_OF_FILE {
        header.size = u32::try_from(remaining)
            .map_err(|_| OpenError::InvalidSize(header.name, pos, TO_END_OF_FILE))?;
    }
    if (header.size as usize) < PREAMBLE_SIZE || u64::from(header.size) > remaining {
        return Err(OpenError::InvalidSize(header.name, pos, header.size));
    }
    Ok(header)
}

fn read_atoms<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    source: &Arc<File>,
    options: &EngineOptions,
    path: &Path,
) -> Result<Vec<Atom>, OpenError> {
    let mut atoms = vec![];
    let mut pos = 0;

    while pos < len {
        if atoms.len() == options.max_top_level_atoms {
            return Err(OpenError::TooManyAtoms(atoms.len()));
        }
        let header = header_at(reader, pos, len, path)?;

        let atom = match kind::resolve(header.name).1 {
            Storage::File => {
                tracing::debug!(name = %header.name, size = header.size, "leaving atom in file");
                Atom::deferred(header, pos, source)
            }
            Storage::Memory => {
                let mut bytes = Vec::with_capacity(header.size as usize);
                header
                    .write(&mut bytes)
                    .and_then(|_| {
                        bytes.resize(header.size as usize, 0);
                        reader.read_exact(&mut bytes[PREAMBLE_SIZE..])
                    })
                    .map_err(|e| OpenError::ReadFailed(e, path.to_path_buf()))?;
                Atom::raw(header, bytes, Some(pos))
            }
        };

        atoms.push(atom);
        pos += u64::from(header.size);
    }

    Ok(atoms)
}

pub(crate) fn scan_layout<R: Read + Seek>(
    reader: &mut R,
    len: u64,
    options: &EngineOptions,
    path: &Path,
) -> Result<Layout, OpenError> {
    if len < PREAMBLE_SIZE as u64 {
        return Err(OpenError::MissingFileType);
    }

    let first = header_at(reader, 0, len, path)?;
    if first.name != FTYP {
        return Err(OpenError::MissingFileType);
    }
    if first.body_len().unwrap_or(0) < 4 {
        return Err(OpenError::InvalidSize(first.name, 0, first.size));
    }
    let brand = FourCC::deserialize_owned(reader)
        .map_err(|e| OpenError::ReadFailed(e, path.to_path_buf()))?;
    if !options.accepts_brand(brand) {
        return Err(OpenError::UnsupportedBrand(brand));
    }

    let mut metadata = None;
    let mut payload = None;
    let mut atoms = 0;
    let mut pos = 0;

    while pos < len {
        if atoms == options.max_top_level_atoms {
            return Err(OpenError::TooManyAtoms(atoms));
        }
        let header = header_at(reader, pos, len, path)?;
        if header.name == MOOV {
            metadata.get_or_insert(pos);
        } else if header.name == MDAT {
            payload.get_or_insert(pos);
        }
        atoms += 1;
        pos += u64::from(header.size);
    }

    let metadata = metadata.ok_or(OpenError::MissingMetadata)?;
    let payload = payload.ok_or(OpenError::MissingPayload)?;
    if metadata > payload {
        return Err(OpenError::MetadataAfterPayload(metadata, payload));
    }

    Ok(Layout {
        brand,
        atoms,
        metadata,
        payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn atom_bytes(name: &[u8; 4], body: &[u8]) -> Vec<u8> {
        let mut out = ((body.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(name);
        out.extend_from_slice(body);
        out
    }

    fn scan(bytes: Vec<u8>) -> Result<Layout, OpenError> {
        let len = bytes.len() as u64;
        scan_layout(
            &mut Cursor::new(bytes),
            len,
            &EngineOptions::default(),
            Path::new("test.mp4"),
        )
    }

    fn ftyp(brand: &[u8; 4]) -> Vec<u8> {
        let mut body = brand.to_vec();
        body.extend_from_slice(&[0, 0, 0, 0]);
        atom_bytes(b"ftyp", &body)
    }

    #[test]
    fn accepts_moov_before_mdat() {
        let mut bytes = ftyp(b"isom");
        bytes.extend(atom_bytes(b"moov", &[]));
        bytes.extend(atom_bytes(b"mdat", &[7; 32]));

        let layout = scan(bytes).unwrap();
        assert_eq!(layout.brand, *b"isom");
        assert_eq!(layout.atoms, 3);
        assert_eq!(layout.metadata, 16);
        assert_eq!(layout.payload, 24);
    }

    #[test]
    fn rejects_mdat_before_moov() {
        let mut bytes = ftyp(b"mp42");
        bytes.extend(atom_bytes(b"mdat", &[7; 32]));
        bytes.extend(atom_bytes(b"moov", &[]));
        assert!(matches!(
            scan(bytes),
            Err(OpenError::MetadataAfterPayload(56, 16))
        ));
    }

    #[test]
    fn rejects_unknown_brand() {
        let mut bytes = ftyp(b"heic");
        bytes.extend(atom_bytes(b"moov", &[]));
        bytes.extend(atom_bytes(b"mdat", &[]));
        assert!(matches!(scan(bytes), Err(OpenError::UnsupportedBrand(b)) if b == *b"heic"));
    }

    #[test]
    fn rejects_extended_size() {
        let mut bytes = ftyp(b"isom");
        bytes.extend_from_slice(b"\x00\x00\x00\x01mdat\x00\x00\x00\x00\x00\x00\x00\x10");
        assert!(matches!(scan(bytes), Err(OpenError::ExtendedSize(_, 16))));
    }

    #[test]
    fn rejects_trailing_garbage() {
        let mut bytes = ftyp(b"isom");
        bytes.extend(atom_bytes(b"moov", &[]));
        bytes.extend(atom_bytes(b"mdat", &[]));
        bytes.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(scan(bytes), Err(OpenError::TrailingData(3))));
    }

    #[test]
    fn rejects_overlong_atom() {
        let mut bytes = ftyp(b"isom");
        bytes.extend(atom_bytes(b"moov", &[]));
        bytes.extend_from_slice(b"\x00\x00\x01\x00mdat");
        assert!(matches!(scan(bytes), Err(OpenError::InvalidSize(_, 24, 256))));
    }

    #[test]
    fn size_zero_runs_to_end_of_file() {
        let mut bytes = ftyp(b"isom");
        bytes.extend(atom_bytes(b"moov", &[]));
        bytes.extend_from_slice(b"\x00\x00\x00\x00mdat");
        bytes.extend_from_slice(&[9; 100]);
        assert_eq!(scan(bytes).unwrap().atoms, 3);
    }

    #[test]
    fn requires_ftyp_first() {
        let mut bytes = atom_bytes(b"moov", &[]);
        bytes.extend(ftyp(b"isom"));
        assert!(matches!(scan(bytes), Err(OpenError::MissingFileType)));
        assert!(matches!(scan(vec![]), Err(OpenError::MissingFileType)));
    }

    #[test]
    fn requires_both_moov_and_mdat() {
        let mut bytes = ftyp(b"isom");
        bytes.extend(atom_bytes(b"mdat", &[]));
        assert!(matches!(scan(bytes), Err(OpenError::MissingMetadata)));

        let mut bytes = ftyp(b"isom");
        bytes.extend(atom_bytes(b"moov", &[]));
        assert!(matches!(scan(bytes), Err(OpenError::MissingPayload)));
    }

    #[test]
    fn stops_after_atom_limit() {
        let mut bytes = ftyp(b"isom");
        for _ in 0..2000 {
            bytes.extend(atom_bytes(b"free", &[]));
        }
        assert!(matches!(scan(bytes), Err(OpenError::TooManyAtoms(1024))));
    }
}
