pub mod config;
pub mod error;
pub mod transport;
pub mod command;
pub mod notifier;
pub mod state;
pub mod dispatcher;
pub mod sweeper;
pub mod runtime;

pub use crate::config::Config;
pub use error::{BotError, TransportError};
pub use state::AppState;
