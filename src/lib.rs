//! Rolls a spreadsheet of dated inventory or loan sheets forward by one day: the most recent dated
//! sheet is copied into a new sheet named for today, carried-over values are reset or moved, and
//! the derived columns get formulas in the spreadsheet's own locale.

mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod rollover;
mod server;
mod utils;


pub use api::{Mode, GOOGLE_CREDENTIALS_ENV, TEST_MODE_ENV};
pub use config::{Config, SecretKind, Settings};
pub use error::{Error, ErrorType, IntoResult, Result};
