use bincode::{deserialize_from, serialize_into};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tempfile::NamedTempFile;

use crate::sheet::Sheet;

/// Writes a sheet as gzip-compressed bincode
///
/// The data goes to a temporary file in the same directory which then replaces
/// `filename`, so readers never see a half-written sheet.
pub fn save_sheet(sheet: &Sheet, filename: impl AsRef<Path>) -> std::io::Result<()> {
    let filename = filename.as_ref();
    let dir = match filename.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let tmp = NamedTempFile::new_in(dir)?;
    {
        let encoder = GzEncoder::new(tmp.as_file(), Compression::default());
        let mut writer = BufWriter::new(encoder);

        serialize_into(&mut writer, sheet)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

        let encoder = writer.into_inner().map_err(|e| e.into_error())?;
        encoder.finish()?.flush()?;
    }
    tmp.as_file().sync_all()?;
    tmp.persist(filename).map_err(|e| e.error)?;

    Ok(())
}

pub fn load_sheet(filename: impl AsRef<Path>) -> std::io::Result<Sheet> {
    let file = File::open(filename)?;
    let decoder = GzDecoder::new(file);
    let mut reader = BufReader::new(decoder);

    let sheet: Sheet = deserialize_from(&mut reader)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

    Ok(sheet)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.sheet.gz");

        let mut sheet = Sheet::with_headers(vec!["Timestamp".to_string(), "Email".to_string()]);
        sheet.push(vec!["t1".to_string(), "a@ucr.edu".to_string()]);
        save_sheet(&sheet, &path).unwrap();

        let loaded = load_sheet(&path).unwrap();
        assert_eq!(loaded, sheet);
        assert_eq!(loaded.last_row(), 2);
    }

    #[test]
    fn saving_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contact.sheet.gz");

        let mut sheet = Sheet::with_headers(vec!["Timestamp".to_string()]);
        save_sheet(&sheet, &path).unwrap();
        sheet.push(vec!["t1".to_string()]);
        save_sheet(&sheet, &path).unwrap();

        assert_eq!(load_sheet(&path).unwrap().last_row(), 2);
    }

    #[test]
    fn corrupt_file_is_invalid_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.sheet.gz");
        std::fs::write(&path, b"not a sheet").unwrap();

        let err = load_sheet(&path).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
