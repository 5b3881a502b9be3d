use std::fs::File;
use std::io::{prelude::*, BufWriter, SeekFrom};

use super::Mp4File;
use crate::{
    atom::Atom,
    error::WriteError,
    fourcc::FourCC,
    kind::Storage,
    ser::Serialize,
};

impl Mp4File {
    /// Writes the tree to the output file.
    ///
    /// Memory-backed atoms are collapsed and written from memory. File-backed
    /// atoms are copied from the source in chunks and never parsed. A failed
    /// write to a separate output removes the partial file; a failed in-place
    /// write leaves the file as it is, since it is the only copy.
    pub fn write_file(&mut self) -> Result<(), WriteError> {
        let output = self.output.clone().ok_or(WriteError::NoOutput)?;
        if self.root.is_none() {
            return Err(WriteError::NoInput);
        }

        if self.is_in_place() {
            let result = self.write_in_place();
            if let Err(e) = &result {
                tracing::error!(path = %output.display(), error = %e, "in-place write aborted");
            }
            return result;
        }

        let file = File::create(&output).map_err(|e| WriteError::CreateFailed(e, output.clone()))?;
        let mut writer = BufWriter::new(file);
        let result = self
            .write_atoms(&mut writer)
            .and_then(|_| {
                writer
                    .flush()
                    .map_err(|e| WriteError::FinishFailed(e, output.clone()))
            });

        if let Err(e) = &result {
            tracing::error!(path = %output.display(), error = %e, "write aborted, removing output");
            drop(writer);
            if let Err(e) = std::fs::remove_file(&output) {
                tracing::warn!(path = %output.display(), error = %e, "could not remove partial output");
            }
        } else {
            tracing::debug!(path = %output.display(), "wrote file");
        }
        result
    }

    fn write_atoms<W: Write>(&mut self, writer: &mut W) -> Result<(), WriteError> {
        let chunk_size = self.options.chunk_size;
        let atoms = match self.root.as_mut().and_then(Atom::children_mut) {
            Some(atoms) => atoms,
            None => return Err(WriteError::NoInput),
        };

        for atom in atoms.iter_mut() {
            match atom.storage() {
                Storage::Memory => {
                    let name = atom.name();
                    atom.collapse()
                        .and_then(|_| atom.write(writer))
                        .map_err(|e| WriteError::AtomFailed(e, name))?;
                }
                Storage::File => stream_atom(atom, writer, chunk_size)?,
            }
        }
        Ok(())
    }

    /// Rewrites the source file through its own handle.
    ///
    /// File-backed atoms are moved to their new offsets first, in an order
    /// that never overwrites bytes still to be copied. Everything else is in
    /// memory and written afterwards.
    fn write_in_place(&mut self) -> Result<(), WriteError> {
        let chunk_size = self.options.chunk_size;
        let file = self.source.clone().ok_or(WriteError::NoInput)?;
        let atoms = match self.root.as_mut().and_then(Atom::children_mut) {
            Some(atoms) => atoms,
            None => return Err(WriteError::NoInput),
        };

        let mut moves = vec![];
        let mut offset = 0u64;
        for (index, atom) in atoms.iter_mut().enumerate() {
            match atom.storage() {
                Storage::Memory => {
                    let name = atom.name();
                    atom.collapse().map_err(|e| WriteError::AtomFailed(e, name))?;
                }
                Storage::File => {
                    let from = atom.location().ok_or(WriteError::SourceClosed(atom.name()))?;
                    moves.push(Move {
                        index,
                        from,
                        to: offset,
                        len: atom.size(),
                    });
                }
            }
            offset += atom.size();
        }
        let total = offset;

        let mut file: &File = &file;
        let (left, right): (Vec<&Move>, Vec<&Move>) = moves.iter().partition(|m| m.to <= m.from);
        for m in left.iter() {
            m.apply(&mut file, chunk_size)
                .map_err(|e| WriteError::AtomFailed(e, atoms[m.index].name()))?;
        }
        for m in right.iter().rev() {
            m.apply(&mut file, chunk_size)
                .map_err(|e| WriteError::AtomFailed(e, atoms[m.index].name()))?;
        }
        for m in moves.iter() {
            atoms[m.index].relocate(m.to);
        }

        let mut offset = 0u64;
        for atom in atoms.iter() {
            if atom.storage() == Storage::Memory {
                let mut writer = BufWriter::new(file);
                writer
                    .seek(SeekFrom::Start(offset))
                    .and_then(|_| atom.write(&mut writer))
                    .and_then(|_| writer.flush())
                    .map_err(|e| WriteError::AtomFailed(e, atom.name()))?;
            }
            offset += atom.size();
        }

        let path = self.output.clone().unwrap_or_default();
        file.set_len(total)
            .and_then(|_| file.sync_all())
            .map_err(|e| WriteError::FinishFailed(e, path.clone()))?;
        tracing::debug!(path = %path.display(), len = total, moved = moves.len(), "wrote file in place");
        Ok(())
    }
}

/// Copies a file-backed atom from its source, `chunk_size` bytes at a time.
fn stream_atom<W: Write>(atom: &Atom, writer: &mut W, chunk_size: usize) -> Result<(), WriteError> {
    let name = atom.name();
    let total = atom.original_size().map(u64::from).unwrap_or(0);
    let mut offset = 0u64;

    while offset < total {
        let len = chunk_size.min((total - offset) as usize);
        let chunk = atom.data_chunk(offset, len).map_err(|e| chunk_error(e, name))?;
        writer
            .write_all(&chunk)
            .map_err(|e| WriteError::AtomFailed(e, name))?;
        offset += len as u64;
    }

    tracing::debug!(%name, bytes = total, "streamed atom from source");
    Ok(())
}

fn chunk_error(error: std::io::Error, name: FourCC) -> WriteError {
    match error.kind() {
        std::io::ErrorKind::NotFound => WriteError::SourceClosed(name),
        _ => WriteError::AtomFailed(error, name),
    }
}

/// One file-backed atom changing place within its own file.
#[derive(Debug, Clone, Copy)]
struct Move {
    index: usize,
    from: u64,
    to: u64,
    len: u64,
}

impl Move {
    /// Copies front to back when moving left and back to front when moving
    /// right, so overlapping ranges are safe.
    fn apply<F: Read + Write + Seek>(&self, file: &mut F, chunk_size: usize) -> std::io::Result<()> {
        if self.from == self.to {
            return Ok(());
        }
        let mut buf = vec![0u8; chunk_size];
        let mut done = 0u64;

        while done < self.len {
            let len = chunk_size.min((self.len - done) as usize);
            let offset = if self.to < self.from {
                done
            } else {
                self.len - done - len as u64
            };
            file.seek(SeekFrom::Start(self.from + offset))?;
            file.read_exact(&mut buf[..len])?;
            file.seek(SeekFrom::Start(self.to + offset))?;
            file.write_all(&buf[..len])?;
            done += len as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn moved(bytes: &[u8], from: u64, to: u64, len: u64, chunk_size: usize) -> Vec<u8> {
        let mut cursor = Cursor::new(bytes.to_vec());
        Move {
            index: 0,
            from,
            to,
            len,
        }
        .apply(&mut cursor, chunk_size)
        .unwrap();
        cursor.into_inner()
    }

    #[test]
    fn moves_left_over_itself() {
        let out = moved(b"__abcdefgh", 2, 0, 8, 3);
        assert_eq!(&out[..8], b"abcdefgh");
    }

    #[test]
    fn moves_right_over_itself() {
        let out = moved(b"abcdefgh__", 0, 2, 8, 3);
        assert_eq!(&out[2..], b"abcdefgh");
    }

    #[test]
    fn moves_past_the_end() {
        let out = moved(b"abcd", 0, 6, 4, 4096);
        assert_eq!(out, b"abcd\0\0abcd");
    }
}
