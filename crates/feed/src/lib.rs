pub mod auth;
pub mod codec;
pub mod connector;
pub mod ingestor;
pub mod retry;
pub mod supervisor;

pub use auth::{StaticToken, TokenProvider};
pub use codec::{decode, DecodeError, Decoded, SkipReason};
pub use connector::{HttpConnector, LineStream, StreamConnector, StreamFailure, StreamRequest};
pub use ingestor::{IngestState, IngestStats, StreamIngestor};
pub use retry::{RetryDelay, RetryPolicy};
pub use supervisor::{IngestSettings, Supervisor};
