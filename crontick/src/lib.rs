//! # Crontick
//!
//! A Tokio ticker that delivers clock ticks on a crontab schedule.
//!
//! Crontick provides a [`Ticker`](ticker::Ticker): a single background timer
//! task that computes successive occurrences of a cron-style rule and sends
//! each occurrence's timestamp on a bounded channel. It is designed as a
//! library an application drops into its runtime wherever "do something at
//! these times" is needed, without running a full job scheduler.
//!
//! ## Core Concepts
//!
//! - **Ticker**: owns the schedule and the timer task; exposes the tick
//!   channel plus `stop`/`reset` controls.
//! - **Delivery slot**: the tick channel holds at most one pending tick. A
//!   slow consumer delays delivery but ticks are never skipped, queued
//!   without bound, or reordered.
//! - **Drift-free rescheduling**: each occurrence is computed from the
//!   previous *scheduled* time, not from when delivery happened, so
//!   backpressure never shifts the schedule.
//! - **Configurable grammar**: a [`Parser`](parser::Parser) decides which
//!   specification fields are recognized: the standard five-field crontab
//!   by default, with opt-in seconds and `@`-descriptors such as `@hourly`
//!   and `@every 90s`.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use crontick::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), crontick::error::Error> {
//!     // Tick at minute 0 of every hour.
//!     let mut ticker = Ticker::new("0 * * * *")?;
//!
//!     if let Some(tick) = ticker.ticks.recv().await {
//!         println!("scheduled for {tick}");
//!     }
//!
//!     // Switch to a daily schedule; the tick channel stays the same.
//!     ticker.reset("@daily").await?;
//!     ticker.stop().await;
//!     Ok(())
//! }
//! ```

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod config;
pub mod error;
pub mod parser;
pub mod schedule;
pub mod ticker;

/// A prelude module for easy importing of the most common Crontick types.
pub mod prelude {
    pub use crate::config::{FieldName, TickerConfig};
    pub use crate::error::{Error, Result};
    pub use crate::parser::{Fields, Parser};
    pub use crate::schedule::Schedule;
    pub use crate::ticker::Ticker;
}
