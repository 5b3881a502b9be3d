use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};

use crate::{
    atom::{Atom, Payload},
    fourcc::FourCC,
    header::AtomHeader,
    kind::AtomKind,
};

pub(crate) trait Serialize {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()>;
}

impl Serialize for FourCC {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(self.as_bytes())
    }
}

impl Serialize for AtomHeader {
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_u32::<BigEndian>(self.size)?;
        self.name.write(writer)
    }
}

impl Serialize for Atom {
    /// Writes the atom exactly as `collapse` would lay it out.
    ///
    /// File-backed payloads are not available here and are written as nothing.
    fn write<W: Write>(&self, writer: &mut W) -> std::io::Result<()> {
        match self.payload() {
            Payload::Raw(bytes) => writer.write_all(bytes),
            Payload::Deferred => Ok(()),
            Payload::Analyzed { data, children } => {
                let kind = self.kind();
                if kind != AtomKind::Pseudo {
                    let size = u32::try_from(self.size()).map_err(|_| {
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("atom `{}` exceeds the 32-bit size field", self.name()),
                        )
                    })?;
                    AtomHeader::new(size, self.name()).write(writer)?;
                }
                if kind.keeps_data() {
                    writer.write_all(data)?;
                }
                if kind.keeps_children() {
                    for child in children {
                        child.write(writer)?;
                    }
                }
                Ok(())
            }
        }
    }
}
