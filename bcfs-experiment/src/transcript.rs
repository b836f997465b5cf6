//! Per-block CSV transcript: one row per trial record, "N/A" for missing
//! reaction times and accuracies.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use bcfs_core::{BlockKind, ParseFieldError, TrialRecord};
use tracing::{debug, info};

use crate::error::TranscriptError;

pub const HEADER: [&str; 9] = [
    "participant_id",
    "trial_number",
    "trial_type",
    "stimulus_row",
    "image_reference",
    "reaction_time_ms",
    "response_key",
    "suppressor_side",
    "accuracy",
];

/// Persistence collaborator a finished or aborted block is flushed to.
pub trait TranscriptSink {
    /// Persists `records`, returning where they went when that is a file.
    fn flush(
        &mut self,
        kind: BlockKind,
        participant_id: &str,
        records: &[TrialRecord],
    ) -> Result<Option<PathBuf>, TranscriptError>;
}

pub fn write_records<W: Write>(
    writer: W,
    participant_id: &str,
    records: &[TrialRecord],
) -> Result<(), TranscriptError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(HEADER)?;
    for record in records {
        csv.write_record([
            participant_id.to_string(),
            record.trial_number.to_string(),
            record.trial_type.to_string(),
            record.stimulus_row.to_string(),
            record.image_reference.clone(),
            record.reaction_time_ms.to_string(),
            record.response_key.to_string(),
            record.suppressor_side.to_string(),
            record.accuracy.to_string(),
        ])?;
    }
    csv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn read_records<R: Read>(reader: R) -> Result<Vec<TrialRecord>, TranscriptError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv.records().enumerate() {
        let row = row?;
        // 1-based, counting the header line
        let line = index + 2;
        if row.len() != HEADER.len() {
            return Err(TranscriptError::Columns {
                row: line,
                expected: HEADER.len(),
                found: row.len(),
            });
        }
        let field = |source: ParseFieldError| TranscriptError::Field { row: line, source };

        let trial_number = row[1]
            .trim()
            .parse::<usize>()
            .map_err(|_| field(ParseFieldError::new("trial_number", &row[1])))?;
        records.push(TrialRecord {
            trial_number,
            trial_type: row[2].parse().map_err(field)?,
            stimulus_row: row[3].parse().map_err(field)?,
            image_reference: row[4].to_string(),
            reaction_time_ms: row[5].parse().map_err(field)?,
            response_key: row[6].parse().map_err(field)?,
            suppressor_side: row[7].parse().map_err(field)?,
            accuracy: row[8].parse().map_err(field)?,
        });
    }
    Ok(records)
}

pub fn read_path(path: impl AsRef<Path>) -> Result<Vec<TrialRecord>, TranscriptError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| TranscriptError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records = read_records(file)?;
    debug!(path = %path.display(), records = records.len(), "transcript read");
    Ok(records)
}

/// Writes each flushed block to
/// `<dir>/<participant>_<practice|main>_<YYYYmmdd-HHMMSS>.csv`.
#[derive(Debug, Clone)]
pub struct CsvTranscript {
    dir: PathBuf,
}

impl CsvTranscript {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(kind: BlockKind, participant_id: &str) -> String {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        format!("{participant_id}_{}_{stamp}.csv", kind.label())
    }

    /// Creates `name` in the output directory, or `<stem>_<n>.csv` when a
    /// transcript of that name already exists. Never truncates.
    fn create_unique(&self, name: &str) -> Result<(PathBuf, File), TranscriptError> {
        let stem = name.strip_suffix(".csv").unwrap_or(name);
        let mut attempt = 0usize;
        loop {
            let path = if attempt == 0 {
                self.dir.join(name)
            } else {
                self.dir.join(format!("{stem}_{attempt}.csv"))
            };
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "transcript name taken");
                    attempt += 1;
                }
                Err(source) => return Err(TranscriptError::Io { path, source }),
            }
        }
    }
}

impl TranscriptSink for CsvTranscript {
    fn flush(
        &mut self,
        kind: BlockKind,
        participant_id: &str,
        records: &[TrialRecord],
    ) -> Result<Option<PathBuf>, TranscriptError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| TranscriptError::Io { path, source }
        };
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let (path, file) = self.create_unique(&Self::file_name(kind, participant_id))?;
        write_records(file, participant_id, records)?;

        info!(path = %path.display(), block = %kind, records = records.len(), "transcript written");
        Ok(Some(path))
    }
}

/// Keeps flushed blocks in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTranscript {
    pub blocks: Vec<(BlockKind, String, Vec<TrialRecord>)>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self, kind: BlockKind) -> Vec<TrialRecord> {
        self.blocks
            .iter()
            .filter(|(k, _, _)| *k == kind)
            .flat_map(|(_, _, records)| records.iter().cloned())
            .collect()
    }
}

impl TranscriptSink for MemoryTranscript {
    fn flush(
        &mut self,
        kind: BlockKind,
        participant_id: &str,
        records: &[TrialRecord],
    ) -> Result<Option<PathBuf>, TranscriptError> {
        self.blocks
            .push((kind, participant_id.to_string(), records.to_vec()));
        Ok(None)
    }
}
