pub mod config;
pub mod engine;
pub mod gaps;
pub mod runner;
pub mod session;
pub mod trade;

pub use config::{EngineParams, StrategyFileConfig};
pub use engine::{BracketEngine, StrategyState};
pub use gaps::{GapMonitor, GapReport};
pub use runner::{RunSummary, SignalRunner};
pub use session::SessionWindow;
pub use trade::{Bracket, Trade};
