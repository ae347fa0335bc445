//! Row stream parsing for flat tree sources
//!
//! A source is a delimited text file with an `id,name,parent` header
//! followed by one record per line. Rows are decoded lazily, one at a
//! time, so a gigabyte source never has to fit in memory. Decoding is
//! strict: a malformed row fails the whole pass, since a partial tree
//! is worse than an explicit error.

use crate::error::{CanopyError, CanopyResult};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

/// One decoded row. Ephemeral: consumed during a build pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Node identifier, unique within one source
    pub id: u64,

    /// Display name
    pub name: String,

    /// Parent node id; `None` marks a root
    pub parent: Option<u64>,
}

/// Lazy stream of records over one source file.
///
/// Restartable by re-opening the path. No side effects beyond reading.
#[derive(Debug)]
pub struct RowStream {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl RowStream {
    /// Open a source file and consume its header line.
    ///
    /// Fails with `SourceUnavailable` when the path does not exist at
    /// open time. An empty file decodes as an empty stream.
    pub async fn open(path: &Path) -> CanopyResult<Self> {
        let file = File::open(path).await.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CanopyError::SourceUnavailable(path.to_path_buf()),
            _ => CanopyError::io(format!("opening source {}", path.display()), e),
        })?;

        let mut lines = BufReader::new(file).lines();
        let header = lines
            .next_line()
            .await
            .map_err(|e| CanopyError::io(format!("reading header of {}", path.display()), e))?;

        if let Some(header) = header {
            let fields: Vec<&str> = header.split(',').map(str::trim).collect();
            if fields != ["id", "name", "parent"] {
                return Err(CanopyError::decode(
                    path,
                    1,
                    format!("expected header 'id,name,parent', got '{}'", header.trim()),
                ));
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            lines,
            line: 1,
        })
    }

    /// Decode the next record, or `Ok(None)` at end-of-source.
    pub async fn next_record(&mut self) -> CanopyResult<Option<Record>> {
        loop {
            let line = self
                .lines
                .next_line()
                .await
                .map_err(|e| CanopyError::io(format!("reading {}", self.path.display()), e))?;

            let Some(line) = line else {
                return Ok(None);
            };
            self.line += 1;

            // A trailing newline produces one empty line; skip it.
            if line.trim().is_empty() {
                continue;
            }

            return self.decode(&line).map(Some);
        }
    }

    /// Line number of the most recently decoded row (1-based, header included)
    pub fn line(&self) -> usize {
        self.line
    }

    fn decode(&self, line: &str) -> CanopyResult<Record> {
        let fields: Vec<&str> = line.split(',').collect();
        let [id, name, parent] = fields.as_slice() else {
            return Err(CanopyError::decode(
                &self.path,
                self.line,
                format!("expected 3 fields, got {}", fields.len()),
            ));
        };

        let id = id.trim().parse::<u64>().map_err(|_| {
            CanopyError::decode(&self.path, self.line, format!("invalid id '{}'", id.trim()))
        })?;

        let parent = match parent.trim() {
            "" => None,
            raw => Some(raw.parse::<u64>().map_err(|_| {
                CanopyError::decode(&self.path, self.line, format!("invalid parent id '{raw}'"))
            })?),
        };

        Ok(Record {
            id,
            name: name.trim().to_string(),
            parent,
        })
    }
}

/// Fresh modification timestamp of a source file.
///
/// A missing path maps to `SourceUnavailable`, so this stat doubles as
/// the existence check on the query path.
pub async fn last_modified(path: &Path) -> CanopyResult<DateTime<Utc>> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => CanopyError::SourceUnavailable(path.to_path_buf()),
        _ => CanopyError::io(format!("reading metadata for {}", path.display()), e),
    })?;

    let modified = metadata
        .modified()
        .map_err(|e| CanopyError::io(format!("reading mtime for {}", path.display()), e))?;

    Ok(modified.into())
}
