//! Processed-identifier ledger
//!
//! A flat text file with one `isbn13,isbn10` pair per line. The ledger is
//! opened once per run and owns its file handle; dropping the [`Ledger`]
//! releases it on every exit path.
//!
//! The in-memory [`LedgerIndex`] is keyed by ISBN-13, so no identifier is ever
//! written twice no matter how often it is offered to [`Ledger::append_new`].

use crate::error::EnrichError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, info, warn};
use xyzb_common::LedgerEntry;

/// Default required file name suffix
pub const DEFAULT_LEDGER_EXTENSION: &str = ".csv";

const FIELD_DELIMITER: char = ',';

const UTF8_BOM: &[u8] = b"\xef\xbb\xbf";

/// How the ledger file is opened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerOptions {
    /// File name must end with this suffix
    pub expected_extension: String,
    /// Create an empty file when none exists
    pub create_if_missing: bool,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            expected_extension: DEFAULT_LEDGER_EXTENSION.to_string(),
            create_if_missing: false,
        }
    }
}

/// Set of known identifiers, keyed by ISBN-13
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerIndex {
    entries: HashMap<String, Option<String>>,
}

impl LedgerIndex {
    pub fn contains(&self, isbn13: &str) -> bool {
        self.entries.contains_key(isbn13)
    }

    /// Derived ISBN-10 recorded for `isbn13`, if any
    pub fn isbn10(&self, isbn13: &str) -> Option<&str> {
        self.entries.get(isbn13).and_then(|v| v.as_deref())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert an entry; returns false if the ISBN-13 was already present
    pub fn insert(&mut self, entry: LedgerEntry) -> bool {
        if self.entries.contains_key(&entry.isbn13) {
            return false;
        }
        self.entries.insert(entry.isbn13, entry.isbn10);
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = LedgerEntry> + '_ {
        self.entries
            .iter()
            .map(|(isbn13, isbn10)| LedgerEntry::new(isbn13.clone(), isbn10.clone()))
    }
}

/// Durable set of processed identifiers, owned by one run
///
/// [`Ledger`] is the file-backed implementation.
#[async_trait]
pub trait LedgerStore: Send {
    /// Read every known identifier
    async fn load(&mut self) -> Result<LedgerIndex, EnrichError>;

    /// Persist entries not yet known; returns the number written
    async fn append_new(&mut self, entries: &[LedgerEntry]) -> Result<usize, EnrichError>;
}

/// Result of parsing one ledger line
#[derive(Debug, PartialEq, Eq)]
enum ParsedLine {
    Blank,
    Entry(LedgerEntry),
    Malformed,
}

fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() {
        return ParsedLine::Blank;
    }

    let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
    match fields.as_slice() {
        [isbn13] if !isbn13.is_empty() => ParsedLine::Entry(LedgerEntry::new(*isbn13, None)),
        [isbn13, isbn10] if !isbn13.is_empty() => {
            let isbn10 = Some(isbn10.to_string()).filter(|s| !s.is_empty());
            ParsedLine::Entry(LedgerEntry::new(*isbn13, isbn10))
        }
        _ => ParsedLine::Malformed,
    }
}

/// Ledger file handle plus the identifiers it holds
pub struct Ledger {
    path: PathBuf,
    file: File,
    index: LedgerIndex,
}

impl Ledger {
    /// Open the ledger file for reading and appending
    ///
    /// Fails with [`EnrichError::StorageUnavailable`] if the file name does not
    /// end with the configured extension, or the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>, options: &LedgerOptions) -> Result<Self, EnrichError> {
        let path = path.as_ref();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !file_name.ends_with(&options.expected_extension) {
            return Err(EnrichError::StorageUnavailable(format!(
                "{} is not a {} file",
                path.display(),
                options.expected_extension
            )));
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(options.create_if_missing)
            .open(path)
            .await
            .map_err(|e| storage_error("open", path, e))?;

        debug!(path = %path.display(), "Opened ledger file");

        Ok(Self {
            path: path.to_path_buf(),
            file,
            index: LedgerIndex::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Identifiers known so far (loaded plus appended)
    pub fn index(&self) -> &LedgerIndex {
        &self.index
    }

    /// Read every line of the file into the index
    ///
    /// Blank lines are ignored. Malformed lines, including ones that are not
    /// valid UTF-8, are skipped with a warning. A leading byte order mark is
    /// dropped.
    /// When an ISBN-13 appears on several lines the first one wins.
    pub async fn load(&mut self) -> Result<LedgerIndex, EnrichError> {
        self.file
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| storage_error("seek", &self.path, e))?;

        let mut content = Vec::new();
        self.file
            .read_to_end(&mut content)
            .await
            .map_err(|e| storage_error("read", &self.path, e))?;
        let content = content.strip_prefix(UTF8_BOM).unwrap_or(&content[..]);

        let mut index = LedgerIndex::default();
        let mut malformed = 0usize;

        for (i, raw) in content.split(|b| *b == b'\n').enumerate() {
            let parsed = match std::str::from_utf8(raw) {
                Ok(line) => parse_line(line),
                Err(_) => ParsedLine::Malformed,
            };
            match parsed {
                ParsedLine::Blank => {}
                ParsedLine::Entry(entry) => {
                    let isbn13 = entry.isbn13.clone();
                    if !index.insert(entry) {
                        debug!(line = i + 1, isbn13 = %isbn13, "Duplicate ledger line ignored");
                    }
                }
                ParsedLine::Malformed => {
                    malformed += 1;
                    warn!(line = i + 1, path = %self.path.display(), "Skipping malformed ledger line");
                }
            }
        }

        info!(
            path = %self.path.display(),
            entries = index.len(),
            malformed,
            "Loaded ledger"
        );

        self.index = index.clone();
        Ok(index)
    }

    /// Append entries whose ISBN-13 is not yet in the ledger
    ///
    /// Entries already in the index, and repeats within `entries`, are
    /// dropped. The file is made to end with a newline before the new lines
    /// are written, then flushed and synced. Returns the number of lines
    /// written; an empty batch touches nothing.
    pub async fn append_new(&mut self, entries: &[LedgerEntry]) -> Result<usize, EnrichError> {
        let mut batch_seen = HashSet::new();
        let fresh: Vec<&LedgerEntry> = entries
            .iter()
            .filter(|e| !self.index.contains(&e.isbn13) && batch_seen.insert(e.isbn13.as_str()))
            .collect();

        if fresh.is_empty() {
            debug!(path = %self.path.display(), "No new ledger entries to append");
            return Ok(0);
        }

        let mut buf = String::new();
        if !self.ends_with_newline().await? {
            buf.push('\n');
        }
        for entry in &fresh {
            buf.push_str(&entry.to_line());
            buf.push('\n');
        }

        self.file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|e| storage_error("seek", &self.path, e))?;
        self.file
            .write_all(buf.as_bytes())
            .await
            .map_err(|e| storage_error("append to", &self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| storage_error("flush", &self.path, e))?;
        self.file
            .sync_data()
            .await
            .map_err(|e| storage_error("sync", &self.path, e))?;

        let written = fresh.len();
        for entry in fresh {
            self.index.insert(entry.clone());
        }

        info!(path = %self.path.display(), written, "Appended ledger entries");
        Ok(written)
    }

    /// True for an empty file or one whose last byte is `\n`
    async fn ends_with_newline(&mut self) -> Result<bool, EnrichError> {
        let len = self
            .file
            .metadata()
            .await
            .map_err(|e| storage_error("stat", &self.path, e))?
            .len();
        if len == 0 {
            return Ok(true);
        }

        self.file
            .seek(SeekFrom::End(-1))
            .await
            .map_err(|e| storage_error("seek", &self.path, e))?;
        let mut last = [0u8; 1];
        self.file
            .read_exact(&mut last)
            .await
            .map_err(|e| storage_error("read", &self.path, e))?;

        Ok(last[0] == b'\n')
    }
}

#[async_trait]
impl LedgerStore for Ledger {
    async fn load(&mut self) -> Result<LedgerIndex, EnrichError> {
        Ledger::load(self).await
    }

    async fn append_new(&mut self, entries: &[LedgerEntry]) -> Result<usize, EnrichError> {
        Ledger::append_new(self, entries).await
    }
}

fn storage_error(action: &str, path: &Path, err: std::io::Error) -> EnrichError {
    EnrichError::StorageUnavailable(format!("failed to {} {}: {}", action, path.display(), err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(isbn13: &str, isbn10: &str) -> LedgerEntry {
        LedgerEntry::new(isbn13, Some(isbn10.to_string()))
    }

    async fn open_with(dir: &TempDir, name: &str, content: &str) -> Ledger {
        let path = dir.path().join(name);
        std::fs::write(&path, content).unwrap();
        Ledger::open(&path, &LedgerOptions::default()).await.unwrap()
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line(""), ParsedLine::Blank);
        assert_eq!(parse_line("   "), ParsedLine::Blank);
        assert_eq!(
            parse_line("9781891830853,1891830856"),
            ParsedLine::Entry(entry("9781891830853", "1891830856"))
        );
        assert_eq!(
            parse_line("9781891830853"),
            ParsedLine::Entry(LedgerEntry::new("9781891830853", None))
        );
        assert_eq!(
            parse_line("9781891830853,"),
            ParsedLine::Entry(LedgerEntry::new("9781891830853", None))
        );
        assert_eq!(parse_line(",1891830856"), ParsedLine::Malformed);
        assert_eq!(parse_line("a,b,c"), ParsedLine::Malformed);
    }

    #[tokio::test]
    async fn test_open_rejects_wrong_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isbn.txt");
        std::fs::write(&path, "").unwrap();

        let result = Ledger::open(&path, &LedgerOptions::default()).await;
        assert!(matches!(result, Err(EnrichError::StorageUnavailable(_))));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isbn.csv");

        let result = Ledger::open(&path, &LedgerOptions::default()).await;
        assert!(matches!(result, Err(EnrichError::StorageUnavailable(_))));

        let options = LedgerOptions {
            create_if_missing: true,
            ..Default::default()
        };
        let mut ledger = Ledger::open(&path, &options).await.unwrap();
        assert!(path.exists());
        assert!(ledger.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_blank_and_malformed_lines() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_with(
            &dir,
            "isbn.csv",
            "9781891830853,1891830856\r\n\n,orphan\n9781603094542,1603094547\na,b,c\n9781891830853,9999999999\n\n",
        )
        .await;

        let index = ledger.load().await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("9781891830853"));
        assert!(index.contains("9781603094542"));
        // First occurrence wins
        assert_eq!(index.isbn10("9781891830853"), Some("1891830856"));
        assert_eq!(ledger.index(), &index);
    }

    #[tokio::test]
    async fn test_load_skips_invalid_utf8_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isbn.csv");
        let mut content = b"9781891830853,1891830856\n".to_vec();
        content.extend_from_slice(&[0xff, 0xfe, b',', b'x', b'\n']);
        content.extend_from_slice(b"9781234567897,123456789X\n");
        std::fs::write(&path, content).unwrap();

        let mut ledger = Ledger::open(&path, &LedgerOptions::default()).await.unwrap();
        let index = ledger.load().await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("9781891830853"));
        assert_eq!(index.isbn10("9781234567897"), Some("123456789X"));
    }

    #[tokio::test]
    async fn test_load_ignores_byte_order_mark() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_with(
            &dir,
            "isbn.csv",
            "\u{feff}9781891830853,1891830856\n9781234567897,123456789X\n",
        )
        .await;

        let index = ledger.load().await.unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("9781891830853"));

        let written = ledger
            .append_new(&[entry("9781891830853", "1891830856")])
            .await
            .unwrap();
        assert_eq!(written, 0);
    }

    #[tokio::test]
    async fn test_append_repairs_missing_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_with(&dir, "isbn.csv", "9781891830853,1891830856").await;
        ledger.load().await.unwrap();

        let written = ledger
            .append_new(&[entry("9781603094542", "1603094547")])
            .await
            .unwrap();
        assert_eq!(written, 1);

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(
            content,
            "9781891830853,1891830856\n9781603094542,1603094547\n"
        );
    }

    #[tokio::test]
    async fn test_append_skips_known_and_repeated_entries() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_with(&dir, "isbn.csv", "9781891830853,1891830856\n").await;
        ledger.load().await.unwrap();

        let written = ledger
            .append_new(&[
                entry("9781891830853", "1891830856"),
                entry("9781603094542", "1603094547"),
                entry("9781603094542", "1603094547"),
                entry("9781234567897", "123456789X"),
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);

        // A second offer of the same entries writes nothing
        let written = ledger
            .append_new(&[entry("9781603094542", "1603094547")])
            .await
            .unwrap();
        assert_eq!(written, 0);

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content.lines().count(), 3);
        assert_eq!(ledger.index().len(), 3);
    }

    #[tokio::test]
    async fn test_empty_append_leaves_file_untouched() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open_with(&dir, "isbn.csv", "9781891830853,1891830856").await;
        ledger.load().await.unwrap();

        assert_eq!(ledger.append_new(&[]).await.unwrap(), 0);

        let content = std::fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content, "9781891830853,1891830856");
    }

    #[tokio::test]
    async fn test_reopen_sees_appended_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isbn.csv");
        std::fs::write(&path, "").unwrap();

        {
            let mut ledger = Ledger::open(&path, &LedgerOptions::default()).await.unwrap();
            ledger.load().await.unwrap();
            ledger
                .append_new(&[entry("9781234567897", "123456789X")])
                .await
                .unwrap();
        }

        let mut ledger = Ledger::open(&path, &LedgerOptions::default()).await.unwrap();
        let index = ledger.load().await.unwrap();
        assert_eq!(index.isbn10("9781234567897"), Some("123456789X"));
    }

    #[tokio::test]
    async fn test_failed_append_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("isbn.csv");
        std::fs::write(&path, "").unwrap();

        // Read-only handle: every write fails
        let mut ledger = Ledger {
            path: path.clone(),
            file: File::open(&path).await.unwrap(),
            index: LedgerIndex::default(),
        };

        let err = ledger
            .append_new(&[entry("9781234567897", "123456789X")])
            .await
            .unwrap_err();
        assert!(matches!(err, EnrichError::StorageUnavailable(_)));
        assert!(!ledger.index().contains("9781234567897"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
