//! Common utilities and helpers

pub mod atomic;
pub mod logging;
pub mod path;
pub mod time;
