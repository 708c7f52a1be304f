pub mod barlog;
pub mod record;
pub mod source;
pub mod tailer;

pub use barlog::BarLog;
pub use record::BarLogRecord;
pub use source::{HistoricSource, LiveSource};
pub use tailer::{read_bars, BarTailer, TailMode};
