use std::io::{Read, Seek};

use byteorder::{BigEndian, ReadBytesExt};

use crate::{fourcc::FourCC, header::AtomHeader};

pub(crate) trait DeserializeOwned {
    fn deserialize_owned<R: Read + Seek>(reader: &mut R) -> std::io::Result<Self>
    where
        Self: Sized;
}

impl DeserializeOwned for FourCC {
    fn deserialize_owned<R: Read + Seek>(reader: &mut R) -> std::io::Result<Self> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(FourCC(buf))
    }
}

impl DeserializeOwned for AtomHeader {
    fn deserialize_owned<R: Read + Seek>(reader: &mut R) -> std::io::Result<Self> {
        let start = reader.stream_position()?;
        let size = reader.read_u32::<BigEndian>()?;
        let name = FourCC::deserialize_owned(reader)?;
        let end = reader.stream_position()?;
        tracing::debug!(
            start = format_args!("{:#x}", start),
            end = format_args!("{:#x}", end),
            size,
            %name,
            "deserialized AtomHeader"
        );
        Ok(AtomHeader { size, name })
    }
}

/// Reads an atom preamble out of a byte slice without any I/O.
///
/// Returns `None` when fewer than eight bytes are available.
pub(crate) fn parse_header(data: &[u8]) -> Option<AtomHeader> {
    let size = u32::from_be_bytes(data.get(0..4)?.try_into().ok()?);
    let name = FourCC::exact(data.get(4..8)?)?;
    Some(AtomHeader { size, name })
}
