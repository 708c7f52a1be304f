use std::collections::VecDeque;
use std::io::{ErrorKind, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, info, warn};

use common::{Bar, Result, Shutdown};

use crate::record::BarLogRecord;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);
const READ_CHUNK: usize = 64 * 1024;

/// Where a tailer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailMode {
    /// Drain the file from byte 0, then keep following it.
    Replay,
    /// Skip what is already there and only yield new appends.
    Follow,
}

/// Follows a bar log as it grows, yielding bars in append order.
///
/// The tailer only ever opens the file for reading. It tolerates the file
/// not existing yet, and restarts from byte 0 if the file shrinks under it.
pub struct BarTailer {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    /// Bytes of an incomplete trailing line.
    partial: Vec<u8>,
    lines: VecDeque<String>,
    poll_interval: Duration,
    truncations: u64,
}

impl BarTailer {
    pub async fn open(path: impl Into<PathBuf>, mode: TailMode) -> Result<Self> {
        let path = path.into();
        let mut tailer = Self {
            path,
            file: None,
            offset: 0,
            partial: Vec::new(),
            lines: VecDeque::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            truncations: 0,
        };

        match File::open(&tailer.path).await {
            Ok(mut file) => {
                if mode == TailMode::Follow {
                    tailer.offset = file.seek(SeekFrom::End(0)).await?;
                }
                tailer.file = Some(file);
            }
            // Appears later; everything in it will be new.
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %tailer.path.display(), "Bar log does not exist yet, waiting for it");
            }
            Err(e) => return Err(e.into()),
        }

        info!(path = %tailer.path.display(), mode = ?mode, offset = tailer.offset, "Tailing bar log");
        Ok(tailer)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of truncations detected so far.
    pub fn truncations(&self) -> u64 {
        self.truncations
    }

    /// Next complete line, waiting for the file to grow as long as needed.
    pub async fn next_line(&mut self) -> Result<String> {
        loop {
            if let Some(line) = self.lines.pop_front() {
                return Ok(line);
            }
            if !self.fill().await? {
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    /// Next decodable bar. Blank and undecodable lines are skipped.
    pub async fn next_bar(&mut self) -> Result<Bar> {
        loop {
            let line = self.next_line().await?;
            if line.trim().is_empty() {
                continue;
            }
            match BarLogRecord::parse_line(&line) {
                Ok(bar) => return Ok(bar),
                Err(e) => {
                    warn!(path = %self.path.display(), error = %e, "Skipping undecodable bar log line");
                }
            }
        }
    }

    /// Like `next_bar`, but returns `None` once shutdown is requested.
    pub async fn next_bar_or_shutdown(&mut self, shutdown: &mut Shutdown) -> Result<Option<Bar>> {
        tokio::select! {
            _ = shutdown.triggered() => Ok(None),
            bar = self.next_bar() => bar.map(Some),
        }
    }

    /// Read whatever the file holds beyond the current offset.
    /// Returns false when there was nothing new.
    async fn fill(&mut self) -> Result<bool> {
        if self.file.is_none() {
            match File::open(&self.path).await {
                Ok(file) => {
                    info!(path = %self.path.display(), "Bar log appeared");
                    self.file = Some(file);
                }
                Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(e.into()),
            }
        }
        let Some(file) = self.file.as_mut() else {
            return Ok(false);
        };

        let len = file.metadata().await?.len();
        if len < self.offset {
            warn!(
                path = %self.path.display(),
                offset = self.offset,
                len = len,
                "Bar log truncated under tailer, restarting from byte 0; bars may have been lost"
            );
            self.truncations += 1;
            self.offset = file.seek(SeekFrom::Start(0)).await?;
            self.partial.clear();
        }

        let mut buf = vec![0u8; READ_CHUNK];
        let n = file.read(&mut buf).await?;
        if n == 0 {
            return Ok(false);
        }
        self.offset += n as u64;
        self.split_lines(&buf[..n]);
        debug!(path = %self.path.display(), bytes = n, offset = self.offset, "Read bar log chunk");
        Ok(true)
    }

    fn split_lines(&mut self, chunk: &[u8]) {
        self.partial.extend_from_slice(chunk);
        let mut start = 0;
        while let Some(pos) = self.partial[start..].iter().position(|&b| b == b'\n') {
            let end = start + pos;
            let raw = &self.partial[start..end];
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            self.lines.push_back(String::from_utf8_lossy(raw).into_owned());
            start = end + 1;
        }
        self.partial.drain(..start);
    }
}

/// Every complete record currently in the log at `path`, without following.
/// A trailing line with no newline yet is left out. Lines that are not valid
/// UTF-8 or do not decode are skipped like the tailer skips them.
pub async fn read_bars(path: &Path) -> Result<Vec<Bar>> {
    let content = tokio::fs::read(path).await?;
    let complete = match content.iter().rposition(|&b| b == b'\n') {
        Some(last) => &content[..last],
        None => &[][..],
    };

    let mut bars = Vec::new();
    for raw in complete.split(|&b| b == b'\n') {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let line = String::from_utf8_lossy(raw);
        if line.trim().is_empty() {
            continue;
        }
        match BarLogRecord::parse_line(&line) {
            Ok(bar) => bars.push(bar),
            Err(e) => warn!(path = %path.display(), error = %e, "Skipping undecodable bar log line"),
        }
    }
    Ok(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use common::BarStatus;
    use rust_decimal::Decimal;

    fn record(minute: i64, close: i64) -> String {
        let bar = Bar {
            received_at: Utc.with_ymd_and_hms(2024, 2, 14, 18, 0, 0).unwrap()
                + ChronoDuration::minutes(minute),
            bar_time: None,
            status: BarStatus::Closed,
            open: Decimal::from(close),
            high: Decimal::from(close),
            low: Decimal::from(close),
            close: Decimal::from(close),
            total_volume: 3,
            up_volume: 2,
            down_volume: 1,
            total_ticks: 3,
            up_ticks: 2,
            down_ticks: 1,
            unchanged_ticks: 0,
            unchanged_volume: 0,
        };
        BarLogRecord::from_bar(&bar).to_line().unwrap()
    }

    fn append_bytes(path: &Path, bytes: &[u8]) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
    }

    async fn next(tailer: &mut BarTailer) -> String {
        tokio::time::timeout(Duration::from_secs(2), tailer.next_line())
            .await
            .expect("timeout")
            .unwrap()
    }

    fn append(path: &Path, text: &str) {
        let mut f = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .unwrap();
        f.write_all(text.as_bytes()).unwrap();
        f.flush().unwrap();
    }

    #[tokio::test]
    async fn partial_lines_wait_for_their_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ES.log");
        append(&path, "one\ntw");

        let mut tailer = BarTailer::open(&path, TailMode::Replay)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(next(&mut tailer).await, "one");

        let pending = tokio::time::timeout(Duration::from_millis(100), tailer.next_line()).await;
        assert!(pending.is_err(), "half a line must not be yielded");

        append(&path, "o\r\nthree\n");
        assert_eq!(next(&mut tailer).await, "two");
        assert_eq!(next(&mut tailer).await, "three");
    }

    #[tokio::test]
    async fn follow_mode_skips_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ES.log");
        append(&path, "old-1\nold-2\n");

        let mut tailer = BarTailer::open(&path, TailMode::Follow)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        append(&path, "new-1\n");
        assert_eq!(next(&mut tailer).await, "new-1");
    }

    #[tokio::test]
    async fn waits_for_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.log");

        let mut tailer = BarTailer::open(&path, TailMode::Follow)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        let writer_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            append(&writer_path, "first\n");
        });
        assert_eq!(next(&mut tailer).await, "first");
    }

    #[tokio::test]
    async fn truncation_restarts_from_start_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ES.log");
        append(&path, "first-a\nfirst-b\n");

        let mut tailer = BarTailer::open(&path, TailMode::Replay)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));
        assert_eq!(next(&mut tailer).await, "first-a");
        assert_eq!(next(&mut tailer).await, "first-b");

        std::fs::write(&path, "c\n").unwrap();
        assert_eq!(next(&mut tailer).await, "c");
        assert_eq!(tailer.truncations(), 1);

        append(&path, "d\n");
        assert_eq!(next(&mut tailer).await, "d");
        assert_eq!(tailer.truncations(), 1);
    }

    #[tokio::test]
    async fn read_bars_ignores_incomplete_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ES.log");
        append(&path, "{\"not\": \"a bar\"}\n{\"High\":");
        let bars = read_bars(&path).await.unwrap();
        assert!(bars.is_empty());
    }

    #[tokio::test]
    async fn read_bars_skips_lines_that_are_not_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ES.log");
        append(&path, &record(0, 100));
        append_bytes(&path, b"\xff\xfe garbage\n");
        append(&path, &record(1, 101));

        let bars = read_bars(&path).await.unwrap();
        let closes: Vec<_> = bars.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![Decimal::from(100), Decimal::from(101)]);
    }

    #[tokio::test]
    async fn replay_then_follow_yields_every_record_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ES.log");
        for minute in 0..3 {
            append(&path, &record(minute, 100 + minute));
        }

        let mut tailer = BarTailer::open(&path, TailMode::Replay)
            .await
            .unwrap()
            .with_poll_interval(Duration::from_millis(10));

        let mut closes = Vec::new();
        for _ in 0..3 {
            let bar = tokio::time::timeout(Duration::from_secs(2), tailer.next_bar())
                .await
                .expect("timeout")
                .unwrap();
            closes.push(bar.close);
        }

        // Nothing more until the writer appends.
        let idle = tokio::time::timeout(Duration::from_millis(100), tailer.next_bar()).await;
        assert!(idle.is_err());

        append(&path, &record(3, 103));
        append(&path, &record(4, 104));
        for _ in 0..2 {
            let bar = tokio::time::timeout(Duration::from_secs(2), tailer.next_bar())
                .await
                .expect("timeout")
                .unwrap();
            closes.push(bar.close);
        }

        let expected: Vec<_> = (100..105).map(Decimal::from).collect();
        assert_eq!(closes, expected);

        let extra = tokio::time::timeout(Duration::from_millis(100), tailer.next_bar()).await;
        assert!(extra.is_err(), "no record may be yielded twice");
    }
}
