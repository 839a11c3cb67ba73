use std::io::{self, Seek, Write};
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Sequential container of named entries.
///
/// Creating an entry closes the previous one; the returned sink accepts the
/// entry's body until the next call. A path ending in `/` is a directory
/// entry and its sink is expected to stay empty.
pub trait ArchiveWriter {
    fn create_entry(&mut self, path: &str) -> io::Result<&mut (dyn Write + Send)>;
}

/// Joins archive path segments with `/`, ignoring empty segments.
pub fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|s| s.trim_matches('/'))
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Directory entry name for `dir`, i.e. with a trailing `/`.
pub fn dir_entry(dir: &str) -> String {
    format!("{}/", dir.trim_end_matches('/'))
}

/// [`ArchiveWriter`] producing a deflate-compressed zip file.
pub struct ZipReportWriter<W: Write + Seek> {
    zip: ZipWriter<W>,
    options: SimpleFileOptions,
}

impl<W: Write + Seek + Send> ZipReportWriter<W> {
    pub fn new(inner: W) -> Self {
        // Pod logs can exceed 4 GiB, so every file entry is written as ZIP64.
        let options = SimpleFileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .large_file(true);
        Self {
            zip: ZipWriter::new(inner),
            options,
        }
    }

    /// Writes the central directory and returns the underlying writer.
    pub fn finish(self) -> io::Result<W> {
        Ok(self.zip.finish()?)
    }
}

impl<W: Write + Seek + Send> ArchiveWriter for ZipReportWriter<W> {
    fn create_entry(&mut self, path: &str) -> io::Result<&mut (dyn Write + Send)> {
        if path.ends_with('/') {
            self.zip
                .add_directory(path.to_string(), SimpleFileOptions::default())?;
        } else {
            self.zip.start_file(path.to_string(), self.options)?;
        }
        Ok(&mut self.zip)
    }
}
