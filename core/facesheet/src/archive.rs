use std::io::{Cursor, Read};
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::error::FaceSheetError;
use crate::page::PageImage;

/// Largest uncompressed entry accepted (512 MiB).
///
/// The size in the zip header is untrusted: it only bounds the initial
/// buffer, and the actual read stops here.
pub const MAX_ENTRY_BYTES: u64 = 512 * 1024 * 1024;

const INITIAL_BUFFER_BYTES: u64 = 16 * 1024 * 1024;

/// One archive entry after decoding.
///
/// Decode failures stay attached to their entry so a bad page never
/// prevents the rest of the batch from being processed.
#[derive(Debug)]
pub struct ArchiveEntry {
    /// Position among the archive's file entries, directories excluded.
    pub index: usize,
    /// Entry name as stored in the archive.
    pub name: String,
    /// The decoded page, or why this entry could not be read.
    pub page: Result<PageImage, FaceSheetError>,
}

/// Ordered page images read from a zip container.
///
/// The container is read once and fully materialized.
#[derive(Debug)]
pub struct ImageSource {
    entries: Vec<ArchiveEntry>,
}

impl ImageSource {
    /// Read and decode every file entry of the zip archive at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FaceSheetError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| FaceSheetError::Archive(format!("{}: {e}", path.display())))?;
        Self::from_bytes(&bytes)
    }

    /// Decode every file entry of an in-memory zip archive, in the
    /// archive's native entry order. Directory entries are ignored.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FaceSheetError> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes)).map_err(|e| FaceSheetError::Archive(e.to_string()))?;

        let mut entries = Vec::with_capacity(archive.len());
        for position in 0..archive.len() {
            let stored_name = archive
                .name_for_index(position)
                .map(str::to_owned)
                .unwrap_or_else(|| format!("entry {position}"));
            let index = entries.len();
            let page = match archive.by_index(position) {
                Ok(file) if file.is_dir() => continue,
                Ok(file) => {
                    let declared = file.size();
                    read_bounded(file, declared, MAX_ENTRY_BYTES)
                        .and_then(|data| PageImage::decode(index, stored_name.clone(), &data))
                }
                Err(e) => Err(FaceSheetError::DecodeError(e.to_string())),
            };

            debug!(index, name = %stored_name, ok = page.is_ok(), "decoded archive entry");
            entries.push(ArchiveEntry {
                index,
                name: stored_name,
                page,
            });
        }

        Ok(Self { entries })
    }

    /// Number of file entries, including ones that failed to decode.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the archive holds no file entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in archive order.
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    /// Consume the source, yielding its entries in archive order.
    pub fn into_entries(self) -> Vec<ArchiveEntry> {
        self.entries
    }
}

/// Read at most `limit` bytes. `declared` only sizes the first buffer.
fn read_bounded(reader: impl Read, declared: u64, limit: u64) -> Result<Vec<u8>, FaceSheetError> {
    let mut data = Vec::with_capacity(declared.min(INITIAL_BUFFER_BYTES) as usize);
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut data)
        .map_err(|e| FaceSheetError::DecodeError(e.to_string()))?;
    if data.len() as u64 > limit {
        return Err(FaceSheetError::DecodeError(format!(
            "entry is larger than {limit} bytes"
        )));
    }
    Ok(data)
}
