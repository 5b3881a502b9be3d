use std::path::Path;

use crate::{
    error::{OpenError, TagError, WriteError},
    file::{reader::Layout, Mp4File},
    tags::Geotag,
};

/// A file format backend that can read, retag and write one kind of file.
pub trait MetadataHandler {
    fn set_input_file(&mut self, path: &Path);
    fn set_output_file(&mut self, path: &Path);

    /// Checks the input file before it is read.
    fn able_to_process(&self) -> Result<Layout, OpenError>;
    fn read_file(&mut self) -> Result<(), OpenError>;
    fn write_file(&mut self) -> Result<(), WriteError>;

    fn set_title(&mut self, title: &str) -> Result<(), TagError>;
    fn remove_title(&mut self) -> Result<(), TagError>;
    fn set_description(&mut self, description: &str) -> Result<(), TagError>;
    fn remove_description(&mut self) -> Result<(), TagError>;
    fn set_author(&mut self, author: &str) -> Result<(), TagError>;
    fn remove_author(&mut self) -> Result<(), TagError>;
    fn set_geotag(&mut self, geotag: &Geotag) -> Result<(), TagError>;
    fn remove_geotag(&mut self) -> Result<(), TagError>;
    fn set_keywords(&mut self, keywords: &[String]) -> Result<(), TagError>;
    fn set_gps_string(&mut self, gps: &str) -> Result<(), TagError>;
    fn remove_gps_string(&mut self) -> Result<(), TagError>;
    fn remove_all_metadata(&mut self) -> Result<(), TagError>;
    fn remove_author_and_location(&mut self) -> Result<(), TagError>;
}

impl MetadataHandler for Mp4File {
    fn set_input_file(&mut self, path: &Path) {
        Mp4File::set_input_file(self, path)
    }

    fn set_output_file(&mut self, path: &Path) {
        Mp4File::set_output_file(self, path)
    }

    fn able_to_process(&self) -> Result<Layout, OpenError> {
        Mp4File::able_to_process(self)
    }

    fn read_file(&mut self) -> Result<(), OpenError> {
        Mp4File::read_file(self)
    }

    fn write_file(&mut self) -> Result<(), WriteError> {
        Mp4File::write_file(self)
    }

    fn set_title(&mut self, title: &str) -> Result<(), TagError> {
        Mp4File::set_title(self, title)
    }

    fn remove_title(&mut self) -> Result<(), TagError> {
        Mp4File::remove_title(self)
    }

    fn set_description(&mut self, description: &str) -> Result<(), TagError> {
        Mp4File::set_description(self, description)
    }

    fn remove_description(&mut self) -> Result<(), TagError> {
        Mp4File::remove_description(self)
    }

    fn set_author(&mut self, author: &str) -> Result<(), TagError> {
        Mp4File::set_author(self, author)
    }

    fn remove_author(&mut self) -> Result<(), TagError> {
        Mp4File::remove_author(self)
    }

    fn set_geotag(&mut self, geotag: &Geotag) -> Result<(), TagError> {
        Mp4File::set_geotag(self, geotag)
    }

    fn remove_geotag(&mut self) -> Result<(), TagError> {
        Mp4File::remove_geotag(self)
    }

    fn set_keywords(&mut self, keywords: &[String]) -> Result<(), TagError> {
        Mp4File::set_keywords(self, keywords)
    }

    fn set_gps_string(&mut self, gps: &str) -> Result<(), TagError> {
        Mp4File::set_gps_string(self, gps)
    }

    fn remove_gps_string(&mut self) -> Result<(), TagError> {
        Mp4File::remove_gps_string(self)
    }

    fn remove_all_metadata(&mut self) -> Result<(), TagError> {
        Mp4File::remove_all_metadata(self)
    }

    fn remove_author_and_location(&mut self) -> Result<(), TagError> {
        Mp4File::remove_author_and_location(self)
    }
}
