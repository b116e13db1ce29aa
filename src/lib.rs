//! # chorelog
//!
//! Household chore tracking: register family members, assign one-off or
//! recurring chores to one or more of them, and log who did what each day.
//!
//! The pure core lives in [`completion`], [`grouping`] and [`trends`]; it
//! never fails on bad data and simply leaves malformed records or tasks out.
//! [`storage`] keeps everything in JSON files and validates rows once on the
//! way in. [`commands`] and [`tui`] are the CLI and dashboard front ends.

pub mod commands;
pub mod completion;
pub mod error;
pub mod grouping;
pub mod models;
pub mod session;
pub mod storage;
pub mod trends;
pub mod tui;

pub use error::{Error, Result};
