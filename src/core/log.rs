// Append-only NDJSON collection file: append, lazy corruption-tolerant read, truncate.
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::core::error::{Error, ErrorKind};
use crate::core::record::Record;
use crate::json::parse::record_from_line;

const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_BACKOFF_MAX: Duration = Duration::from_millis(50);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Durability {
    /// Hand writes to the OS and return.
    #[default]
    Fast,
    /// `sync_data` after every append and truncate.
    Flush,
}

/// Handle bound to one collection file.
#[derive(Debug)]
pub struct LogStore {
    path: PathBuf,
    durability: Durability,
}

impl LogStore {
    pub fn new(path: impl Into<PathBuf>, durability: Durability) -> Self {
        Self {
            path: path.into(),
            durability,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `record` as one line, creating the file if absent.
    ///
    /// The whole line goes out in a single `write_all` on an `O_APPEND` handle
    /// while holding an exclusive lock, so readers never see a partial record
    /// from a healthy writer. A torn final line left by a crashed writer is
    /// terminated first so the new record starts on its own line.
    pub fn append(&self, record: &Record) -> Result<(), Error> {
        let encoded = serde_json::to_vec(record).map_err(|err| {
            Error::new(ErrorKind::InvalidRecord)
                .with_message("record is not serializable")
                .with_source(err)
        })?;

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|err| self.io_error("failed to open collection for append", err))?;
        let _lock = WriteLock::acquire(&file, &self.path)?;

        let mut line = Vec::with_capacity(encoded.len() + 2);
        if self.ends_with_torn_line(&file)? {
            tracing::debug!(path = %self.path.display(), "terminating torn final line");
            line.push(b'\n');
        }
        line.extend_from_slice(&encoded);
        line.push(b'\n');

        (&file)
            .write_all(&line)
            .map_err(|err| self.io_error("failed to append record", err))?;
        self.sync(&file)
    }

    fn ends_with_torn_line(&self, file: &File) -> Result<bool, Error> {
        let len = file
            .metadata()
            .map_err(|err| self.io_error("failed to stat collection", err))?
            .len();
        if len == 0 {
            return Ok(false);
        }
        let mut last = [0u8; 1];
        let mut reader = file;
        reader
            .seek(SeekFrom::End(-1))
            .and_then(|_| reader.read_exact(&mut last))
            .map_err(|err| self.io_error("failed to read collection tail", err))?;
        Ok(last[0] != b'\n')
    }

    /// Opens a one-shot lazy scan over the file. A missing file is an empty scan.
    pub fn read_all(&self) -> Result<Records, Error> {
        match File::open(&self.path) {
            Ok(file) => Ok(Records {
                path: self.path.clone(),
                reader: Some(BufReader::new(file)),
                buf: Vec::new(),
                line_no: 0,
                skipped: 0,
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(Records::empty(&self.path)),
            Err(err) => Err(self.io_error("failed to open collection for read", err)),
        }
    }

    /// Truncates the file to zero length, creating it if absent. Idempotent.
    pub fn clear(&self) -> Result<(), Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.path)
            .map_err(|err| self.io_error("failed to open collection for clear", err))?;
        let _lock = WriteLock::acquire(&file, &self.path)?;
        file.set_len(0)
            .map_err(|err| self.io_error("failed to truncate collection", err))?;
        self.sync(&file)
    }

    fn sync(&self, file: &File) -> Result<(), Error> {
        if self.durability == Durability::Flush {
            file.sync_data()
                .map_err(|err| self.io_error("failed to sync collection", err))?;
        }
        Ok(())
    }

    fn io_error(&self, message: &str, err: io::Error) -> Error {
        Error::io(err, &self.path).with_message(message)
    }
}

// Cross-process guard; in-process exclusivity comes from the collection queue.
struct WriteLock<'a> {
    file: &'a File,
}

impl<'a> WriteLock<'a> {
    // Polls so a writer stuck in another process surfaces as `Busy` instead of hanging.
    fn acquire(file: &'a File, path: &Path) -> Result<Self, Error> {
        let deadline = Instant::now() + LOCK_WAIT;
        let mut backoff = Duration::from_millis(1);
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(err) if is_contended(&err) => {
                    if Instant::now() >= deadline {
                        return Err(Error::new(ErrorKind::Busy)
                            .with_message("collection is locked by another writer")
                            .with_path(path)
                            .with_source(err));
                    }
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(LOCK_BACKOFF_MAX);
                }
                Err(err) => {
                    return Err(Error::io(err, path).with_message("failed to lock collection"));
                }
            }
        }
    }
}

impl<'a> Drop for WriteLock<'a> {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Lazy sequence of records from one scan of a collection file.
///
/// Finite and one-shot. Lines that do not decode to a JSON object are skipped;
/// an I/O failure is yielded once and ends the scan.
pub struct Records {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
    line_no: u64,
    skipped: u64,
}

impl Records {
    fn empty(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            reader: None,
            buf: Vec::new(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Number of malformed lines dropped so far.
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

impl Iterator for Records {
    type Item = Result<Record, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let reader = self.reader.as_mut()?;
            self.buf.clear();
            match reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => {
                    self.reader = None;
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    self.reader = None;
                    return Some(Err(Error::io(err, &self.path)
                        .with_message("failed to read collection")));
                }
            }
            self.line_no += 1;
            if self.buf.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            match record_from_line(&self.buf) {
                Ok(record) => return Some(Ok(record)),
                Err(category) => {
                    self.skipped += 1;
                    tracing::debug!(
                        path = %self.path.display(),
                        line = self.line_no,
                        category = category.label(),
                        "skipping malformed line"
                    );
                }
            }
        }
    }
}
