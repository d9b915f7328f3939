// Packs successful batch results into a single zip download.

use std::io::{Cursor, Write};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::errors::ArchiveError;
use crate::core::types::BatchItem;

/// Archive entry name for a source file: stem plus `_clean.png`.
///
/// Every entry is PNG regardless of the input format, so the extension is
/// replaced, not preserved. A name with no stem keeps the whole name.
pub fn entry_name(item_name: &str) -> String {
    let stem = match item_name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => item_name,
    };
    format!("{}_clean.png", stem)
}

/// Build a zip archive of every successfully processed item, in input order.
///
/// Failed and pending items are left out. Timestamps are fixed, so the same
/// set of results always produces byte-identical archives. A batch with no
/// successes yields a valid empty archive.
pub fn build_archive(items: &[BatchItem]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());

    let mut entries = 0usize;
    for item in items {
        if let Some(bytes) = item.state.processed_bytes() {
            writer.start_file(entry_name(&item.name), options)?;
            writer.write_all(bytes)?;
            entries += 1;
        }
    }

    let cursor = writer.finish()?;
    debug!(entries, bytes = cursor.get_ref().len(), "archive built");
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;
    use crate::core::types::ProcessingState;
    use std::io::Read;
    use std::sync::Arc;
    use zip::ZipArchive;

    fn succeeded(name: &str, bytes: &[u8]) -> BatchItem {
        let mut item = BatchItem::new(name.to_string(), bytes.to_vec(), "image/png".to_string());
        item.state = ProcessingState::Success {
            processed_bytes: Arc::new(bytes.to_vec()),
        };
        item
    }

    fn failed(name: &str) -> BatchItem {
        let mut item = BatchItem::new(name.to_string(), vec![1, 2, 3], "image/png".to_string());
        item.state = ProcessingState::Failed {
            kind: ErrorKind::SafetyBlocked,
            message: "blocked".to_string(),
        };
        item
    }

    fn read_entries(archive_bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = ZipArchive::new(Cursor::new(archive_bytes)).unwrap();
        let mut out = Vec::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let mut contents = Vec::new();
            file.read_to_end(&mut contents).unwrap();
            out.push((file.name().to_string(), contents));
        }
        out
    }

    #[test]
    fn entry_names_replace_the_extension() {
        assert_eq!(entry_name("photo.jpeg"), "photo_clean.png");
        assert_eq!(entry_name("scan.v2.png"), "scan.v2_clean.png");
        assert_eq!(entry_name("noext"), "noext_clean.png");
        assert_eq!(entry_name(".hidden"), ".hidden_clean.png");
    }

    #[test]
    fn only_successful_items_are_packed_in_input_order() {
        let items = vec![
            succeeded("b.png", b"second"),
            failed("broken.png"),
            succeeded("a.jpg", b"first"),
        ];

        let entries = read_entries(&build_archive(&items).unwrap());
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], ("b_clean.png".to_string(), b"second".to_vec()));
        assert_eq!(entries[1], ("a_clean.png".to_string(), b"first".to_vec()));
    }

    #[test]
    fn same_results_produce_byte_identical_archives() {
        let items = vec![succeeded("x.png", b"payload"), succeeded("y.png", b"more")];
        let first = build_archive(&items).unwrap();
        let second = build_archive(&items).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_batch_yields_a_valid_empty_archive() {
        let bytes = build_archive(&[]).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(archive.len(), 0);

        // All-failed batches archive the same way.
        let bytes = build_archive(&[failed("a.png"), failed("b.png")]).unwrap();
        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(archive.len(), 0);
    }
}
