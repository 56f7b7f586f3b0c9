//! Line-delimited JSON storage
//!
//! One item per line. Inserts append; replacements rewrite the file through
//! a temporary sibling that is renamed over the original.

use crate::item::{Item, ItemKey};
use crate::storage::traits::{StorageError, StorageResult, UpsertSink};
use crate::storage::{ensure_parent_dir, temp_path};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// JSONL storage backend
#[derive(Debug)]
pub struct JsonlSink {
    path: PathBuf,
}

impl JsonlSink {
    /// Opens the file at `path`, creating its directory if needed
    pub fn new(path: &Path) -> StorageResult<Self> {
        ensure_parent_dir(path)?;
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file as raw lines; bytes are not required to be UTF-8
    fn read_lines(&self) -> StorageResult<Vec<Vec<u8>>> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        let mut lines: Vec<Vec<u8>> = content
            .split(|byte| *byte == b'\n')
            .map(<[u8]>::to_vec)
            .collect();
        if lines.last().is_some_and(|line| line.is_empty()) {
            lines.pop();
        }
        Ok(lines)
    }

    /// Parses one stored line; blank lines are `None`, malformed ones are
    /// logged and also `None`
    fn parse_line(&self, number: usize, line: &[u8]) -> Option<Item> {
        if line.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        match serde_json::from_slice::<Item>(line) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::error!(
                    "Invalid JSON in file {} line {}: {}",
                    self.path.display(),
                    number + 1,
                    e
                );
                None
            }
        }
    }
}

impl UpsertSink for JsonlSink {
    fn find(&self, key: &ItemKey) -> StorageResult<Option<Item>> {
        Ok(self
            .read_lines()?
            .iter()
            .enumerate()
            .filter_map(|(number, line)| self.parse_line(number, line))
            .find(|item| item.matches(key)))
    }

    fn insert(&mut self, item: Item) -> StorageResult<Item> {
        let line = serde_json::to_string(&item)?;

        let append = || -> io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .read(true)
                .append(true)
                .open(&self.path)?;

            // A torn last line must not swallow the new record
            if file.metadata()?.len() > 0 {
                let mut last = [0u8; 1];
                file.seek(SeekFrom::End(-1))?;
                file.read_exact(&mut last)?;
                if last[0] != b'\n' {
                    file.write_all(b"\n")?;
                }
            }
            writeln!(file, "{}", line)
        };
        append().map_err(|e| StorageError::io(&self.path, e))?;

        Ok(item)
    }

    fn replace(&mut self, item: Item, key: &ItemKey) -> StorageResult<Item> {
        let lines = self.read_lines()?;
        let replacement = serde_json::to_string(&item)?;

        let mut replaced = false;
        let mut output = Vec::with_capacity(lines.len());
        for (number, line) in lines.iter().enumerate() {
            if !replaced
                && self
                    .parse_line(number, line)
                    .is_some_and(|stored| stored.matches(key))
            {
                output.push(replacement.as_bytes());
                replaced = true;
            } else {
                // Malformed lines are carried over untouched
                output.push(line.as_slice());
            }
        }

        if !replaced {
            return Err(StorageError::NotFound(key.to_string()));
        }

        let temp = temp_path(&self.path);
        let write = || -> io::Result<()> {
            let mut writer = BufWriter::new(fs::File::create(&temp)?);
            for line in &output {
                writer.write_all(line)?;
                writer.write_all(b"\n")?;
            }
            writer
                .into_inner()
                .map_err(|e| e.into_error())?
                .sync_all()?;
            fs::rename(&temp, &self.path)
        };
        write().map_err(|e| StorageError::io(&self.path, e))?;

        Ok(item)
    }
}
