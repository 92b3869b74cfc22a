//! zz market maker.
//!
//! Wires the components into one process:
//! - exchange websocket connection with market subscriptions
//! - price oracles (Binance trade stream, Binance REST polling)
//! - the maker engine and its driver
//! - a paper-mode wallet service

pub mod app;
pub mod config;
pub mod error;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
