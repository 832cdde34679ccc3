//! File transport: binary log files with size/time rotation, part
//! retention, optional stream encryption and write buffering.

use crate::error::{CoreError, CoreResult};
use crate::options::{RotateMode, SinkOptions};
use crate::sink::Transport;
use crate::sinks::encrypt::{random_iv, EncryptStream, EncryptionKey};
use chrono::{DateTime, Datelike, Utc};
use silpipe_codec::{FileHeader, Packet};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

enum Output {
    Plain(File),
    Encrypted(EncryptStream<File>),
}

impl Output {
    fn write_all(&mut self, data: &[u8]) -> CoreResult<()> {
        match self {
            Output::Plain(file) => {
                file.write_all(data)?;
                Ok(())
            }
            Output::Encrypted(stream) => stream.write_all(data),
        }
    }

    fn flush(&mut self) -> CoreResult<()> {
        match self {
            Output::Plain(file) => {
                file.flush()?;
                Ok(())
            }
            Output::Encrypted(stream) => stream.flush(),
        }
    }

    fn finish(self) -> CoreResult<()> {
        match self {
            Output::Plain(mut file) => {
                file.flush()?;
                Ok(())
            }
            Output::Encrypted(stream) => {
                stream.finish()?;
                Ok(())
            }
        }
    }
}

/// Identifier of the UTC rotation window a point in time falls into.
fn window_id(at: DateTime<Utc>, mode: RotateMode) -> Option<i64> {
    match mode {
        RotateMode::None => None,
        RotateMode::Hourly => Some(at.timestamp().div_euclid(3600)),
        RotateMode::Daily => Some(at.timestamp().div_euclid(86_400)),
        RotateMode::Weekly => {
            let week = at.iso_week();
            Some(i64::from(week.year()) * 100 + i64::from(week.week()))
        }
        RotateMode::Monthly => Some(i64::from(at.year()) * 12 + i64::from(at.month0())),
    }
}

/// A transport writing framed packets to a log file.
pub struct FileTransport {
    path: PathBuf,
    append: bool,
    maxsize: u64,
    rotate: RotateMode,
    maxparts: usize,
    buffer: u64,
    encrypt: bool,
    key: Option<EncryptionKey>,

    output: Option<Output>,
    written: u64,
    unflushed: u64,
    window: Option<i64>,
}

impl FileTransport {
    /// Builds a file transport from resolved options.
    ///
    /// Recognized keys: `file`, `append`, `maxsize`, `rotate`,
    /// `maxparts`, `buffer`, `encrypt`, `key`. A missing `key` with
    /// `encrypt` enabled is rejected at `open`, not here.
    pub fn from_options(options: &SinkOptions) -> Self {
        let encrypt = options.get_bool("encrypt", false);
        // CBC cannot resume mid-stream, so encryption forces a fresh
        // file; turning encryption off restores the append option.
        let append = !encrypt && options.get_bool("append", false);
        Self {
            path: PathBuf::from(options.get_str("file", "log.sil")),
            append,
            maxsize: options.get_size("maxsize", 0),
            rotate: options.get_rotate("rotate", RotateMode::None),
            maxparts: options.get_int("maxparts", 0).max(0) as usize,
            buffer: options.get_size("buffer", 0),
            encrypt,
            key: options
                .get_raw("key")
                .map(EncryptionKey::from_option)
                .filter(|_| encrypt),
            output: None,
            written: 0,
            unflushed: 0,
            window: None,
        }
    }

    fn rotation_active(&self) -> bool {
        self.maxsize > 0 || self.rotate != RotateMode::None
    }

    fn header_size(&self) -> u64 {
        if self.encrypt {
            FileHeader::plaintext().size() as u64 + crate::sinks::encrypt::IV_SIZE as u64
        } else {
            FileHeader::plaintext().size() as u64
        }
    }

    fn stem_and_ext(&self) -> (String, String) {
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "log".to_owned());
        let ext = self
            .path
            .extension()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sil".to_owned());
        (stem, ext)
    }

    fn part_path(&self, at: DateTime<Utc>) -> PathBuf {
        let (stem, ext) = self.stem_and_ext();
        let name = format!("{stem}-{}.{ext}", at.format("%Y-%m-%d-%H-%M-%S-%6f"));
        self.path.with_file_name(name)
    }

    /// Recovers the creation time embedded in a part's file name.
    /// Second precision is enough; rotation windows are coarser.
    fn part_timestamp(&self, part: &Path) -> Option<DateTime<Utc>> {
        let (stem, ext) = self.stem_and_ext();
        let name = part.file_name()?.to_string_lossy().into_owned();
        let ts = name
            .strip_prefix(&format!("{stem}-"))?
            .strip_suffix(&format!(".{ext}"))?;
        chrono::NaiveDateTime::parse_from_str(ts.get(..19)?, "%Y-%m-%d-%H-%M-%S")
            .ok()
            .map(|dt| dt.and_utc())
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Lists rotated parts for this log, sorted oldest first. The
    /// timestamp suffix makes lexicographic order chronological.
    fn list_parts(&self) -> CoreResult<Vec<PathBuf>> {
        let (stem, ext) = self.stem_and_ext();
        let prefix = format!("{stem}-");
        let suffix = format!(".{ext}");
        let mut parts = Vec::new();
        for entry in std::fs::read_dir(self.parent_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(&suffix) {
                parts.push(entry.path());
            }
        }
        parts.sort();
        Ok(parts)
    }

    /// Deletes the oldest rotated parts beyond the retention limit.
    /// The newest listed part is the one currently open; the limit
    /// applies to the rotated parts besides it.
    fn prune_parts(&self) -> CoreResult<()> {
        if self.maxparts == 0 {
            return Ok(());
        }
        let parts = self.list_parts()?;
        let rotated = parts.len().saturating_sub(1);
        if rotated <= self.maxparts {
            return Ok(());
        }
        let excess = rotated - self.maxparts;
        for stale in &parts[..excess] {
            std::fs::remove_file(stale)?;
            tracing::debug!(part = %stale.display(), "pruned rotated part");
        }
        Ok(())
    }

    /// Opens a fresh file at `path` and writes the file header.
    fn open_fresh(&mut self, path: &Path) -> CoreResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let output = if self.encrypt {
            let key = self
                .key
                .as_ref()
                .ok_or_else(|| CoreError::config("encryption enabled without a key"))?
                .clone();
            let iv = random_iv();
            let mut file = file;
            FileHeader::encrypted(iv).write_to(&mut file)?;
            Output::Encrypted(EncryptStream::new(file, &key, &iv))
        } else {
            let mut file = file;
            FileHeader::plaintext().write_to(&mut file)?;
            Output::Plain(file)
        };
        self.output = Some(output);
        self.written = self.header_size();
        self.unflushed = 0;
        Ok(())
    }

    /// Opens `path` for appending, writing the header only when the
    /// file is empty or new. Plaintext only.
    fn open_append(&mut self, path: &Path) -> CoreResult<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(path)?;
        let len = file.metadata()?.len();
        if len == 0 {
            FileHeader::plaintext().write_to(&mut file)?;
            self.written = self.header_size();
        } else {
            self.written = len;
        }
        self.output = Some(Output::Plain(file));
        self.unflushed = 0;
        Ok(())
    }

    /// Closes the current part and starts the next one.
    fn rotate_now(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if let Some(output) = self.output.take() {
            output.finish()?;
        }
        self.open_fresh(&self.part_path(now))?;
        self.window = window_id(now, self.rotate);
        self.prune_parts()?;
        Ok(())
    }

    fn ensure_open(&mut self) -> CoreResult<&mut Output> {
        self.output.as_mut().ok_or(CoreError::Disconnected)
    }
}

impl Transport for FileTransport {
    fn protocol(&self) -> &'static str {
        "file"
    }

    fn open(&mut self) -> CoreResult<()> {
        if self.encrypt && self.key.is_none() {
            return Err(CoreError::config("encryption enabled without a key"));
        }
        self.open_inner().map_err(|e| match e {
            CoreError::Io(err) => {
                CoreError::connect(format!("{}: {err}", self.path.display()))
            }
            other => other,
        })
    }

    fn write_packet(&mut self, packet: &Packet) -> CoreResult<()> {
        let now = Utc::now();

        if self.rotate != RotateMode::None && self.window != window_id(now, self.rotate) {
            self.rotate_now(now)?;
        }

        let size = packet.size() as u64;
        // A packet larger than maxsize on its own still goes into a
        // fresh part, exactly once.
        if self.maxsize > 0
            && self.written > self.header_size()
            && self.written + size > self.maxsize
        {
            self.rotate_now(now)?;
        }

        let encoded = packet.encode();
        let buffer = self.buffer;
        self.ensure_open()?.write_all(&encoded)?;
        self.written += size;
        self.unflushed += size;
        if buffer == 0 || self.unflushed > buffer {
            self.ensure_open()?.flush()?;
            self.unflushed = 0;
        }
        Ok(())
    }

    fn flush(&mut self) -> CoreResult<()> {
        if let Some(output) = self.output.as_mut() {
            output.flush()?;
            self.unflushed = 0;
        }
        Ok(())
    }

    fn close(&mut self) -> CoreResult<()> {
        if let Some(output) = self.output.take() {
            output.finish()?;
        }
        Ok(())
    }
}

impl FileTransport {
    fn open_inner(&mut self) -> CoreResult<()> {
        let now = Utc::now();
        if self.rotation_active() {
            // Resume the newest part when possible so size accounting
            // carries across reconnects; encryption cannot resume.
            let newest = self.list_parts()?.pop();
            match newest {
                Some(part) if !self.encrypt => {
                    // The resumed part belongs to the window it was
                    // created in; a stale part then rotates on the
                    // first write instead of at the next boundary.
                    let created = self.part_timestamp(&part).unwrap_or(now);
                    self.open_append(&part)?;
                    self.window = window_id(created, self.rotate);
                }
                _ => {
                    self.open_fresh(&self.part_path(now))?;
                    self.window = window_id(now, self.rotate);
                }
            }
            self.prune_parts()?;
        } else if self.append {
            self.open_append(&self.path.clone())?;
        } else {
            self.open_fresh(&self.path.clone())?;
        }
        Ok(())
    }
}
