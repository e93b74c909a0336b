//! Durable record of decided matches.
//!
//! Results are appended to a CSV file whose first line is
//! `Date,Player1,Player2,Winner,Player1ThinkingTime,Player2ThinkingTime,TotalMoves`.
//! Writes that fail because another program holds the file are retried, see
//! [`RetryPolicy`]. Once the log holds `cap` rows the store reports it as full and no new
//! match should be started.

use std::{
    fs::{File, OpenOptions},
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use thiserror::Error;
use time::{format_description::BorrowedFormatItem, macros::format_description, OffsetDateTime};
use tracing::{debug, error, info};

use crate::referee::{MatchReport, Seat};
use crate::retry::RetryPolicy;

pub const HEADER: [&str; 7] = [
    "Date",
    "Player1",
    "Player2",
    "Winner",
    "Player1ThinkingTime",
    "Player2ThinkingTime",
    "TotalMoves",
];

const DATE_FORMAT: &[BorrowedFormatItem<'_>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]");

/// One decided match.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub date: OffsetDateTime,
    pub player1: String,
    pub player2: String,
    pub winner: String,
    pub player1_time: Duration,
    pub player2_time: Duration,
    pub total_moves: u32,
}

impl ResultRecord {
    /// `None` when the match has no winner.
    pub fn from_report(report: &MatchReport) -> Option<ResultRecord> {
        let winner = report.winner()?;
        Some(ResultRecord {
            date: OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc()),
            player1: report.engine(Seat::First).name.clone(),
            player2: report.engine(Seat::Second).name.clone(),
            winner: winner.name.clone(),
            player1_time: report.thinking_time(Seat::First),
            player2_time: report.thinking_time(Seat::Second),
            total_moves: report.turns,
        })
    }

    /// Field values in [`HEADER`] order.
    pub fn fields(&self) -> io::Result<[String; 7]> {
        let date = self.date.format(DATE_FORMAT).map_err(io::Error::other)?;
        Ok([
            date,
            self.player1.clone(),
            self.player2.clone(),
            self.winner.clone(),
            self.player1_time.as_secs_f64().to_string(),
            self.player2_time.as_secs_f64().to_string(),
            self.total_moves.to_string(),
        ])
    }
}

/// Storage behind a [`ResultStore`].
pub trait ResultLog {
    /// Append one row. Must leave the log unchanged when it fails.
    fn append_row(&mut self, record: &ResultRecord) -> io::Result<()>;

    /// Number of data rows currently persisted, header excluded.
    fn row_count(&self) -> io::Result<usize>;
}

/// CSV file log, possibly shared with other readers and writers. The header is written with
/// the first row.
#[derive(Debug)]
pub struct CsvResultLog {
    path: PathBuf,
}

impl CsvResultLog {
    /// Open (without creating) the log at `path`.
    ///
    /// # Errors
    /// The file exists but cannot be read as CSV.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<CsvResultLog> {
        let log = CsvResultLog { path: path.into() };
        let rows = log.row_count()?;
        debug!(path = %log.path.display(), rows, "result log opened");
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultLog for CsvResultLog {
    fn append_row(&mut self, record: &ResultRecord) -> io::Result<()> {
        let fields = record.fields()?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let empty = file.metadata()?.len() == 0;

        // everything stays in the writer's buffer until `flush`, so a failure cannot leave a
        // header without its row
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if empty {
            writer.write_record(HEADER)?;
        }
        writer.write_record(&fields)?;
        writer.flush()
    }

    fn row_count(&self) -> io::Result<usize> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(file);
        let mut rows = 0;
        for record in reader.records() {
            record?;
            rows += 1;
        }
        Ok(rows)
    }
}

/// A result could not be recorded, or the log could not be read back. The run must stop.
#[derive(Debug, Error)]
#[error("result log unavailable after {attempts} attempt(s): {source}")]
pub struct PersistenceError {
    pub attempts: usize,
    #[source]
    pub source: io::Error,
}

/// Outcome of [`ResultStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendStatus {
    Recorded { rows: usize },
    /// The row was written and the log is now full.
    CapReached { rows: usize },
    /// The log was already full, the row was not written.
    Rejected { rows: usize },
}

/// Appends results to a [`ResultLog`] with retries and a row cap.
#[derive(Debug)]
pub struct ResultStore<L: ResultLog> {
    log: L,
    cap: usize,
    retry: RetryPolicy,
}

impl<L: ResultLog> ResultStore<L> {
    pub fn new(log: L, cap: usize, retry: RetryPolicy) -> Self {
        Self { log, cap, retry }
    }

    /// Append `record` unless the log already holds `cap` rows.
    ///
    /// # Errors
    /// The log failed with a non-transient error or kept failing for every attempt.
    pub fn append(&mut self, record: &ResultRecord) -> Result<AppendStatus, PersistenceError> {
        let rows = self.row_count()?;
        if rows >= self.cap {
            info!("result log already holds {rows} rows, result dropped");
            return Ok(AppendStatus::Rejected { rows });
        }

        let log = &mut self.log;
        self.retry
            .run(|_| log.append_row(record))
            .map_err(|failure| {
                error!(
                    "result lost after {} attempt(s): {}",
                    failure.attempts, failure.last_error
                );
                PersistenceError {
                    attempts: failure.attempts,
                    source: failure.last_error,
                }
            })?;

        let rows = self.row_count()?;
        if rows >= self.cap {
            info!("result log holds {rows} rows, cap of {} reached", self.cap);
            Ok(AppendStatus::CapReached { rows })
        } else {
            Ok(AppendStatus::Recorded { rows })
        }
    }

    /// Rows persisted right now, other writers included.
    pub fn row_count(&self) -> Result<usize, PersistenceError> {
        self.retry
            .run(|_| self.log.row_count())
            .map_err(|failure| PersistenceError {
                attempts: failure.attempts,
                source: failure.last_error,
            })
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    pub fn is_full(&self) -> Result<bool, PersistenceError> {
        Ok(self.row_count()? >= self.cap)
    }

    pub fn log(&self) -> &L {
        &self.log
    }
}
