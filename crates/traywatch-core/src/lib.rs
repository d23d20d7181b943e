pub mod api;
pub mod backoff;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod models;
pub mod reporter;
pub mod runtime;
pub mod secure_storage;
pub mod store;
pub mod stream;
pub mod supervisor;

pub use config::{Config, Theme};
pub use error::{ApiError, ConfigError, ReconcileError, StartupError, StreamError};
pub use models::{Aggregate, ConversationCounters, ConversationKind, StatusLevel, StatusSink};
pub use runtime::{RuntimeOptions, TrayWatch};
pub use store::AggregateStore;
