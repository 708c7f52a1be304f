use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use common::{Bar, Error, Result};

use crate::record::BarLogRecord;

/// Path of the log for `ticker` on `day`: `<root>/<YYYYMMDD>/<TICKER>.log`.
pub fn path_for(root: &Path, ticker: &str, day: NaiveDate) -> PathBuf {
    root.join(day.format("%Y%m%d").to_string())
        .join(format!("{ticker}.log"))
}

/// Local calendar day a bar belongs to.
pub fn local_day(at: DateTime<Utc>) -> NaiveDate {
    at.with_timezone(&Local).date_naive()
}

struct DayFile {
    day: NaiveDate,
    path: PathBuf,
    file: File,
}

/// Append-only, date-partitioned bar log.
///
/// Every append resolves the target file from the bar's local day, so a
/// writer that sat idle across midnight still rolls over on its next bar.
/// Each record goes out as one complete line followed by a flush; a reader
/// tailing the file never sees half a record.
pub struct BarLog {
    root: PathBuf,
    files: HashMap<String, DayFile>,
}

impl BarLog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            files: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file currently open for `ticker`, if any.
    pub fn current_path(&self, ticker: &str) -> Option<&Path> {
        self.files.get(ticker).map(|f| f.path.as_path())
    }

    /// Append one bar, rotating to a new day's file first when needed.
    /// Returns the path written to.
    pub async fn append(&mut self, ticker: &str, bar: &Bar) -> Result<PathBuf> {
        let day = local_day(bar.received_at);

        let stale = self.files.get(ticker).map_or(true, |f| f.day != day);
        if stale {
            if let Some(mut previous) = self.files.remove(ticker) {
                previous.file.flush().await?;
                info!(
                    ticker = %ticker,
                    from = %previous.path.display(),
                    day = %day,
                    "Rotating bar log to new day"
                );
            }
            let opened = self.open_day(ticker, day).await?;
            self.files.insert(ticker.to_string(), opened);
        }

        let active = self
            .files
            .get_mut(ticker)
            .ok_or_else(|| Error::Other(format!("no open bar log for {ticker}")))?;

        let line = BarLogRecord::from_bar(bar).to_line()?;
        active.file.write_all(line.as_bytes()).await?;
        active.file.flush().await?;

        debug!(ticker = %ticker, path = %active.path.display(), "Bar appended");
        Ok(active.path.clone())
    }

    /// Flush and release every open handle.
    pub async fn close(&mut self) -> Result<()> {
        for (ticker, mut day_file) in self.files.drain() {
            day_file.file.flush().await?;
            debug!(ticker = %ticker, path = %day_file.path.display(), "Bar log closed");
        }
        Ok(())
    }

    async fn open_day(&self, ticker: &str, day: NaiveDate) -> Result<DayFile> {
        let path = path_for(&self.root, ticker, day);
        if let Some(dir) = path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        info!(ticker = %ticker, path = %path.display(), "Opened bar log");
        Ok(DayFile { day, path, file })
    }
}
