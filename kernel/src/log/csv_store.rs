// CSV File Store
//
// On-disk format: one header row, then one RFC 4180 row per record.
//
// Concurrency: every operation holds an advisory lock on the sidecar
// `<filename>.lock`. Appends take it exclusively for read-last + write-new,
// readers take it shared. The sidecar is never removed.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use fs2::FileExt;
use tracing::{debug, info, warn};

use super::store::RecordStore;
use super::{Entry, LogError, Record, SequenceId};

/// Column names, in order, of the first line of every log file.
pub const HEADER: [&str; 6] = [
    "SequenceID",
    "Classification",
    "Physical Location",
    "Content",
    "UUID",
    "Timestamp",
];

const LOCK_SUFFIX: &str = ".lock";

#[derive(Debug, Clone, Copy)]
enum Access {
    Shared,
    Exclusive,
}

/// What the end of the file says about the next sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    Absent,
    HeaderOnly,
    Last(SequenceId),
}

/// Held for the duration of one critical section.
struct LockGuard {
    file: File,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Debug, Clone)]
pub struct CsvFileStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl CsvFileStore {
    pub fn new(directory: impl AsRef<Path>, filename: &str) -> Result<Self, LogError> {
        if filename.trim().is_empty() {
            return Err(LogError::InvalidPath("file name is empty".into()));
        }

        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => {
                return Err(LogError::InvalidPath(format!(
                    "`{filename}` is not a plain file name"
                )))
            }
        }

        let path = directory.as_ref().join(filename);
        if path.to_str().is_none() {
            return Err(LogError::InvalidPath(format!(
                "{} is not valid UTF-8",
                path.display()
            )));
        }
        let lock_path = path.with_file_name(format!("{filename}{LOCK_SUFFIX}"));

        Ok(Self { path, lock_path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    fn io_error(&self, source: io::Error) -> LogError {
        LogError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn corrupt(&self, reason: impl Into<String>) -> LogError {
        let reason = reason.into();
        warn!(path = %self.path.display(), %reason, "log file is corrupt");
        LogError::CorruptLog {
            path: self.path.clone(),
            reason,
        }
    }

    fn csv_error(&self, err: csv::Error) -> LogError {
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(source) => self.io_error(source),
            _ => self.corrupt(message),
        }
    }

    fn lock(&self, access: Access) -> Result<LockGuard, LogError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|e| self.io_error(e))?;

        match access {
            Access::Shared => FileExt::lock_shared(&file),
            Access::Exclusive => FileExt::lock_exclusive(&file),
        }
        .map_err(|e| self.io_error(e))?;

        Ok(LockGuard { file })
    }

    /// Open the log for reading with its header already validated.
    ///
    /// Returns `None` when the file does not exist.
    fn open_reader(&self) -> Result<Option<csv::Reader<File>>, LogError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let metadata = file.metadata().map_err(|e| self.io_error(e))?;
        if metadata.is_dir() {
            return Err(self.io_error(io::Error::new(
                io::ErrorKind::Other,
                "log path is a directory",
            )));
        }
        if metadata.len() == 0 {
            return Err(self.corrupt("file exists but is empty"));
        }

        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);
        let headers = reader.headers().map_err(|e| self.csv_error(e))?;
        if !headers.iter().eq(HEADER.iter().copied()) {
            let found: Vec<_> = headers.iter().collect();
            return Err(self.corrupt(format!("unexpected header `{}`", found.join(","))));
        }

        Ok(Some(reader))
    }

    fn read_tail(&self) -> Result<Tail, LogError> {
        let Some(mut reader) = self.open_reader()? else {
            return Ok(Tail::Absent);
        };

        let mut current = StringRecord::new();
        let mut last = StringRecord::new();
        let mut rows: u64 = 0;
        while reader
            .read_record(&mut current)
            .map_err(|e| self.csv_error(e))?
        {
            std::mem::swap(&mut current, &mut last);
            rows += 1;
        }

        if rows == 0 {
            return Ok(Tail::HeaderOnly);
        }

        let raw = last.get(0).unwrap_or_default();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(self.corrupt(format!(
                "last row (row {rows}) has unparsable sequence id `{raw}`"
            )));
        }
        match raw.parse::<SequenceId>() {
            Ok(0) => Err(self.corrupt("last row has sequence id 0")),
            Ok(id) => Ok(Tail::Last(id)),
            Err(_) => Err(self.corrupt(format!(
                "last row (row {rows}) has out-of-range sequence id `{raw}`"
            ))),
        }
    }

    fn encode(record: &Record, with_header: bool) -> Result<Vec<u8>, csv::Error> {
        let mut writer = WriterBuilder::new()
            .has_headers(with_header)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.serialize(record)?;
        writer.into_inner().map_err(|e| e.into_error().into())
    }

    /// Whether the existing file's last byte is a line terminator.
    fn ends_with_terminator(&self) -> Result<bool, LogError> {
        let mut file = File::open(&self.path).map_err(|e| self.io_error(e))?;
        let len = file.metadata().map_err(|e| self.io_error(e))?.len();
        if len == 0 {
            return Ok(true);
        }

        let mut last = [0u8; 1];
        file.seek(SeekFrom::Start(len - 1))
            .and_then(|_| file.read_exact(&mut last))
            .map_err(|e| self.io_error(e))?;
        Ok(matches!(last[0], b'\n' | b'\r'))
    }

    /// Open the log for appending. Returns the handle and the length to
    /// roll back to.
    fn open_for_append(&self, create: bool) -> Result<(File, u64), LogError> {
        let mut options = OpenOptions::new();
        options.append(true);
        if create {
            options.create_new(true);
        }
        let file = options.open(&self.path).map_err(|e| self.io_error(e))?;

        let start = if create {
            0
        } else {
            file.metadata().map_err(|e| self.io_error(e))?.len()
        };
        Ok((file, start))
    }

    /// Write one encoded row (plus header for a new file) in a single call.
    fn write_encoded(&self, bytes: &[u8], create: bool) -> Result<(), LogError> {
        let (file, start) = self.open_for_append(create)?;
        self.write_or_rollback(&file, &mut &file, bytes, start, create)
    }

    /// A failed write is rolled back so no partial row survives.
    fn write_or_rollback<W: Write>(
        &self,
        file: &File,
        out: &mut W,
        bytes: &[u8],
        start: u64,
        created: bool,
    ) -> Result<(), LogError> {
        let written = out
            .write_all(bytes)
            .and_then(|()| out.flush())
            .and_then(|()| file.sync_data());

        if let Err(source) = written {
            self.rollback(file, start, created);
            return Err(self.io_error(source));
        }
        Ok(())
    }

    fn rollback(&self, file: &File, len: u64, created: bool) {
        let result = if created {
            fs::remove_file(&self.path)
        } else {
            file.set_len(len)
        };

        match result {
            Ok(()) => warn!(path = %self.path.display(), len, "rolled back partial append"),
            Err(e) => warn!(
                path = %self.path.display(),
                error = %e,
                "failed to roll back partial append"
            ),
        }
    }
}

impl RecordStore for CsvFileStore {
    fn append(&self, entry: &Entry) -> Result<Record, LogError> {
        let _guard = self.lock(Access::Exclusive)?;

        let tail = self.read_tail()?;
        let sequence_id = match tail {
            Tail::Absent | Tail::HeaderOnly => 1,
            Tail::Last(last) => last
                .checked_add(1)
                .ok_or_else(|| self.corrupt("sequence id space exhausted"))?,
        };
        debug!(path = %self.path.display(), ?tail, sequence_id, "assigned sequence id");

        let record = Record::new(sequence_id, entry.clone());
        let create = tail == Tail::Absent;
        let mut bytes = Self::encode(&record, create)
            .map_err(|e| self.io_error(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        if !create && !self.ends_with_terminator()? {
            debug!(path = %self.path.display(), "terminating unterminated last line");
            bytes.insert(0, b'\n');
        }

        self.write_encoded(&bytes, create)?;

        info!(
            path = %self.path.display(),
            sequence_id,
            classification = %record.classification,
            created = create,
            "appended record"
        );
        Ok(record)
    }

    /// Rows whose timestamp is not RFC 3339 are reported as corrupt, even
    /// though appends only need the sequence id column.
    fn load(&self) -> Result<Vec<Record>, LogError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let _guard = self.lock(Access::Shared)?;

        let Some(mut reader) = self.open_reader()? else {
            return Ok(Vec::new());
        };
        reader
            .deserialize::<Record>()
            .map(|row| row.map_err(|e| self.csv_error(e)))
            .collect()
    }

    fn last_sequence(&self) -> Result<Option<SequenceId>, LogError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let _guard = self.lock(Access::Shared)?;

        match self.read_tail()? {
            Tail::Absent | Tail::HeaderOnly => Ok(None),
            Tail::Last(id) => Ok(Some(id)),
        }
    }
}
