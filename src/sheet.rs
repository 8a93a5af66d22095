use crate::saving::{load_sheet, save_sheet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Row has {got} cells, sheet has {expected} columns")]
    RowWidth { expected: usize, got: usize },

    #[error("{path} has header row {found:?}, expected {expected:?}")]
    HeaderMismatch {
        path: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Sheet lock poisoned")]
    Poisoned,
}

/// An append-only table of string cells
///
/// Row 1 is the header row. Rows are never edited or removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sheet {
    rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn with_headers(headers: Vec<String>) -> Self {
        Sheet {
            rows: vec![headers],
        }
    }

    pub fn headers(&self) -> &[String] {
        self.rows.first().map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Appends a row and returns its 1-based index
    pub fn push(&mut self, row: Vec<String>) -> usize {
        self.rows.push(row);
        self.rows.len()
    }

    /// Index of the last row, 0 for a sheet with no rows at all
    pub fn last_row(&self) -> usize {
        self.rows.len()
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Rows after the header
    pub fn responses(&self) -> &[Vec<String>] {
        self.rows.get(1..).unwrap_or(&[])
    }

    /// Widest row, used as the column count for exports
    pub fn width(&self) -> usize {
        self.rows.iter().map(|r| r.len()).max().unwrap_or(0)
    }
}

/// Backing store for submission rows
///
/// Appends are serialized by the store itself; callers hold no lock.
pub trait RowStore: Send + Sync {
    /// Appends a row and returns its 1-based index
    fn append(&self, row: Vec<String>) -> Result<usize, StoreError>;

    fn last_row(&self) -> Result<usize, StoreError>;

    /// Copy of the current contents
    fn snapshot(&self) -> Result<Sheet, StoreError>;
}

fn check_width(sheet: &Sheet, row: &[String]) -> Result<(), StoreError> {
    let expected = sheet.headers().len();
    if expected != 0 && row.len() != expected {
        return Err(StoreError::RowWidth {
            expected,
            got: row.len(),
        });
    }
    Ok(())
}

/// A store that lives only as long as the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    sheet: Mutex<Sheet>,
}

impl MemoryStore {
    pub fn new(headers: Vec<String>) -> Self {
        MemoryStore {
            sheet: Mutex::new(Sheet::with_headers(headers)),
        }
    }
}

impl RowStore for MemoryStore {
    fn append(&self, row: Vec<String>) -> Result<usize, StoreError> {
        let mut sheet = self.sheet.lock().map_err(|_| StoreError::Poisoned)?;
        check_width(&sheet, &row)?;
        Ok(sheet.push(row))
    }

    fn last_row(&self) -> Result<usize, StoreError> {
        let sheet = self.sheet.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(sheet.last_row())
    }

    fn snapshot(&self) -> Result<Sheet, StoreError> {
        let sheet = self.sheet.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(sheet.clone())
    }
}

/// A store persisted to a single compressed file
///
/// The whole sheet is rewritten on every append. A failed write leaves both
/// the file and the in-memory sheet unchanged.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    sheet: Mutex<Sheet>,
}

impl FileStore {
    /// Opens a sheet file, creating it with `headers` when it does not exist
    ///
    /// An existing file must have exactly `headers` as its first row.
    pub fn open(path: impl AsRef<Path>, headers: Vec<String>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let sheet = if path.exists() {
            let sheet = load_sheet(&path)?;
            if sheet.headers() != headers.as_slice() {
                return Err(StoreError::HeaderMismatch {
                    path: path.display().to_string(),
                    expected: headers,
                    found: sheet.headers().to_vec(),
                });
            }
            sheet
        } else {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let sheet = Sheet::with_headers(headers);
            save_sheet(&sheet, &path)?;
            log::info!("Created {}", path.display());
            sheet
        };

        Ok(FileStore {
            path,
            sheet: Mutex::new(sheet),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RowStore for FileStore {
    fn append(&self, row: Vec<String>) -> Result<usize, StoreError> {
        let mut sheet = self.sheet.lock().map_err(|_| StoreError::Poisoned)?;
        check_width(&sheet, &row)?;

        let mut updated = sheet.clone();
        let index = updated.push(row);
        save_sheet(&updated, &self.path)?;
        *sheet = updated;

        Ok(index)
    }

    fn last_row(&self) -> Result<usize, StoreError> {
        let sheet = self.sheet.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(sheet.last_row())
    }

    fn snapshot(&self) -> Result<Sheet, StoreError> {
        let sheet = self.sheet.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(sheet.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers() -> Vec<String> {
        vec!["Timestamp".to_string(), "Email".to_string()]
    }

    fn row(email: &str) -> Vec<String> {
        vec!["t".to_string(), email.to_string()]
    }

    #[test]
    fn first_append_lands_below_header() {
        let store = MemoryStore::new(headers());
        assert_eq!(store.last_row().unwrap(), 1);
        assert_eq!(store.append(row("a@ucr.edu")).unwrap(), 2);
        assert_eq!(store.append(row("a@ucr.edu")).unwrap(), 3);
    }

    #[test]
    fn wrong_width_is_rejected() {
        let store = MemoryStore::new(headers());
        let err = store.append(vec!["t".to_string()]).unwrap_err();
        assert!(matches!(err, StoreError::RowWidth { expected: 2, got: 1 }));
        assert_eq!(store.last_row().unwrap(), 1);
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("polls").join("events.sheet.gz");

        let store = FileStore::open(&path, headers()).unwrap();
        assert_eq!(store.append(row("a@ucr.edu")).unwrap(), 2);
        drop(store);

        let reopened = FileStore::open(&path, headers()).unwrap();
        assert_eq!(reopened.last_row().unwrap(), 2);
        assert_eq!(reopened.append(row("b@ucr.edu")).unwrap(), 3);

        let sheet = reopened.snapshot().unwrap();
        assert_eq!(sheet.headers(), headers().as_slice());
        assert_eq!(sheet.responses().len(), 2);
    }

    #[test]
    fn mismatched_header_refuses_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contact.sheet.gz");
        drop(FileStore::open(&path, headers()).unwrap());

        let mut wider = headers();
        wider.push("Message".to_string());
        let err = FileStore::open(&path, wider).unwrap_err();
        assert!(matches!(
            err,
            StoreError::HeaderMismatch { ref expected, ref found, .. }
                if expected.len() == 3 && found.len() == 2
        ));

        // The file is left untouched.
        assert_eq!(FileStore::open(&path, headers()).unwrap().last_row().unwrap(), 1);
    }

    #[test]
    fn failed_write_keeps_sheet_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("contact.sheet.gz");
        let store = FileStore::open(&path, headers()).unwrap();

        // Replacing the file with a directory makes the rename fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.append(row("a@ucr.edu")).is_err());
        assert_eq!(store.last_row().unwrap(), 1);
    }
}
