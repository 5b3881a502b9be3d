//! High-level tag operations, applied once per enabled dialect.
//!
//! A dialect that fails does not stop the others. Every failure is logged
//! and the failed dialects are reported together in [`TagError::Dialects`].

use super::Mp4File;
use crate::{
    atom::Atom,
    editor::DataMode,
    error::{Dialect, EditError, TagError, XmpError},
    tags::{encode_location, encode_user_string, known_path, paths, Geotag, GpsPosition},
    xmp::{self, XmpHandler, XmpLocation},
};

/// What one atom dialect does for a tag operation.
enum Edit {
    Set {
        path: paths::Names,
        content: Vec<u8>,
        mode: DataMode,
    },
    Delete(paths::Names),
    /// The dialect has no atom for this tag.
    Skip,
}

impl Edit {
    fn apply(&self, root: &mut Atom) -> Result<(), EditError> {
        match self {
            Edit::Set {
                path,
                content,
                mode,
            } => root.set_atom_data(content, &known_path(path), *mode),
            Edit::Delete(path) => match root.delete_atom(&known_path(path)) {
                // Removing an absent tag leaves nothing to do.
                Ok(_) | Err(EditError::NotFound(_)) => Ok(()),
                Err(e) => Err(e),
            },
            Edit::Skip => Ok(()),
        }
    }
}

impl Mp4File {
    fn text(&self, path: paths::Names, text: &str) -> Edit {
        Edit::Set {
            path,
            content: text.as_bytes().to_vec(),
            mode: DataMode::Wrapped {
                flags: self.options.text_flags,
            },
        }
    }

    fn xmp_available(&self) -> bool {
        self.options.dialects.xmp && self.xmp.is_some()
    }

    /// Runs `iso`, `itunes` and `on_xmp` for the dialects that are enabled.
    fn apply<F>(&mut self, iso: Edit, itunes: Edit, on_xmp: F) -> Result<(), TagError>
    where
        F: FnOnce(&mut dyn XmpHandler) -> Result<(), XmpError>,
    {
        let mut attempted = false;
        let mut failed = vec![];

        {
            let root = self.root.as_mut().ok_or(TagError::NotLoaded)?;
            for (dialect, edit) in [(Dialect::Iso, iso), (Dialect::Itunes, itunes)] {
                if matches!(edit, Edit::Skip) || !self.options.dialects.enabled(dialect) {
                    continue;
                }
                attempted = true;
                if let Err(e) = edit.apply(root) {
                    tracing::warn!(%dialect, error = %e, "updating metadata failed");
                    failed.push(dialect);
                }
            }
        }

        if self.xmp_available() {
            attempted = true;
            if let Err(e) = self.update_xmp(on_xmp) {
                tracing::warn!(dialect = %Dialect::Xmp, error = %e, "updating metadata failed");
                failed.push(Dialect::Xmp);
            }
        }

        if !failed.is_empty() {
            return Err(TagError::Dialects(failed));
        }
        if !attempted {
            return Err(TagError::NoDialect);
        }
        Ok(())
    }

    /// Feeds the store the file's packet on first use, applies `f` and
    /// stores the resulting packet back into the tree.
    fn update_xmp<F>(&mut self, f: F) -> Result<(), XmpError>
    where
        F: FnOnce(&mut dyn XmpHandler) -> Result<(), XmpError>,
    {
        let root = self
            .root
            .as_mut()
            .ok_or_else(|| XmpError("no file has been read".into()))?;
        let store = self
            .xmp
            .as_mut()
            .ok_or_else(|| XmpError("no XMP store attached".into()))?;

        let location = match self.xmp_location {
            Some(location) => location,
            None => {
                let (location, packet) = xmp::find_packet(root)
                    .unwrap_or((XmpLocation::UserData, vec![]));
                tracing::debug!(?location, bytes = packet.len(), "loading XMP packet");
                store.set_xmp_data_to_be_processed(&packet)?;
                self.xmp_location = Some(location);
                location
            }
        };

        f(store.as_mut())?;
        let packet = store.processed_data()?;
        xmp::store_packet(root, location, &packet).map_err(|e| XmpError(e.to_string()))
    }

    pub fn set_title(&mut self, title: &str) -> Result<(), TagError> {
        let iso = self.text(paths::ISO_TITLE, title);
        let itunes = self.text(paths::ITUNES_TITLE, title);
        self.apply(iso, itunes, |x| x.set_title(title))
    }

    pub fn remove_title(&mut self) -> Result<(), TagError> {
        self.apply(
            Edit::Delete(paths::ISO_TITLE),
            Edit::Delete(paths::ITUNES_TITLE),
            |x| x.remove_title(),
        )
    }

    pub fn set_description(&mut self, description: &str) -> Result<(), TagError> {
        let iso = self.text(paths::ISO_DESCRIPTION, description);
        let itunes = self.text(paths::ITUNES_COMMENT, description);
        self.apply(iso, itunes, |x| x.set_description(description))
    }

    pub fn remove_description(&mut self) -> Result<(), TagError> {
        self.apply(
            Edit::Delete(paths::ISO_DESCRIPTION),
            Edit::Delete(paths::ITUNES_COMMENT),
            |x| x.remove_description(),
        )
    }

    pub fn set_author(&mut self, author: &str) -> Result<(), TagError> {
        let iso = Edit::Set {
            path: paths::ISO_AUTHOR,
            content: encode_user_string(author),
            mode: DataMode::Direct,
        };
        let itunes = self.text(paths::ITUNES_ARTIST, author);
        self.apply(iso, itunes, |x| x.set_author(author))
    }

    pub fn remove_author(&mut self) -> Result<(), TagError> {
        self.apply(
            Edit::Delete(paths::ISO_AUTHOR),
            Edit::Delete(paths::ITUNES_ARTIST),
            |x| x.remove_author(),
        )
    }

    /// Writes a place without coordinates.
    pub fn set_geotag(&mut self, geotag: &Geotag) -> Result<(), TagError> {
        self.set_location(geotag, None)
    }

    /// Writes a place, with coordinates in the `loci` atom when given.
    pub fn set_location(
        &mut self,
        geotag: &Geotag,
        position: Option<GpsPosition>,
    ) -> Result<(), TagError> {
        let iso = Edit::Set {
            path: paths::ISO_LOCATION,
            content: encode_location(geotag, position),
            mode: DataMode::Direct,
        };
        self.apply(iso, Edit::Skip, |x| x.set_geotag(geotag))
    }

    pub fn remove_geotag(&mut self) -> Result<(), TagError> {
        self.apply(
            Edit::Delete(paths::ISO_LOCATION),
            Edit::Skip,
            |x| x.remove_geotag(),
        )
    }

    /// Keywords only exist in XMP.
    pub fn set_keywords(&mut self, keywords: &[String]) -> Result<(), TagError> {
        self.apply(Edit::Skip, Edit::Skip, |x| x.set_keywords(keywords))
    }

    /// Sets a `lat,lon[,alt]` position. GPS strings only exist in XMP.
    pub fn set_gps_string(&mut self, gps: &str) -> Result<(), TagError> {
        gps.parse::<GpsPosition>()?;
        self.apply(Edit::Skip, Edit::Skip, |x| x.set_gps_string(gps))
    }

    pub fn remove_gps_string(&mut self) -> Result<(), TagError> {
        self.apply(Edit::Skip, Edit::Skip, |x| x.remove_gps_string())
    }

    /// Erases every tag: all of `moov.udta`, every XMP `uuid` atom and, with
    /// a store attached, all XMP properties.
    pub fn remove_all_metadata(&mut self) -> Result<(), TagError> {
        if self.root.is_none() {
            return Err(TagError::NotLoaded);
        }

        let mut failed = vec![];
        if self.xmp_available() {
            if let Err(e) = self.update_xmp(|x| x.remove_all()) {
                tracing::warn!(dialect = %Dialect::Xmp, error = %e, "erasing metadata failed");
                failed.push(Dialect::Xmp);
            }
        }

        let root = self.root.as_mut().ok_or(TagError::NotLoaded)?;
        match root.delete_atom(&known_path(paths::USER_DATA)) {
            Ok(_) => tracing::debug!("removed user data"),
            Err(EditError::NotFound(_)) => {}
            Err(e) => {
                // Both atom dialects live under `udta`.
                tracing::warn!(error = %e, "erasing user data failed");
                failed.extend([Dialect::Iso, Dialect::Itunes]);
            }
        }
        xmp::remove_uuid_packets(root);
        // The packet went with the atoms; start over on the next XMP edit.
        self.xmp_location = None;

        if failed.is_empty() {
            Ok(())
        } else {
            Err(TagError::Dialects(failed))
        }
    }

    /// Removes author, geotag and GPS position in every enabled dialect.
    pub fn remove_author_and_location(&mut self) -> Result<(), TagError> {
        let mut failed = vec![];
        let mut results = vec![self.remove_author(), self.remove_geotag()];
        if self.xmp_available() {
            results.push(self.remove_gps_string());
        }

        for result in results {
            match result {
                Ok(()) | Err(TagError::NoDialect) => {}
                Err(TagError::Dialects(dialects)) => {
                    for dialect in dialects {
                        if !failed.contains(&dialect) {
                            failed.push(dialect);
                        }
                    }
                }
                Err(e) => return Err(e),
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(TagError::Dialects(failed))
        }
    }
}
