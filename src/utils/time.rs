//! Time parsing and formatting utilities

use crate::error::{ReelError, ReelResult};

/// Time parser for the formats accepted on the command line
pub struct TimeParser;

impl TimeParser {
    /// Create a new time parser
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TimeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeParser {
    /// Parse `SS[.ms]`, `MM:SS[.ms]` or `HH:MM:SS[.ms]` into seconds
    pub fn parse_time(&self, time_str: &str) -> ReelResult<f64> {
        let time_str = time_str.trim();
        let invalid = || ReelError::InvalidTimeFormat {
            time: time_str.to_string(),
        };

        let parts: Vec<&str> = time_str.split(':').collect();
        if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        let (whole, last) = parts.split_at(parts.len() - 1);
        let seconds: f64 = last[0].parse().map_err(|_| invalid())?;
        if !seconds.is_finite() || seconds < 0.0 || (!whole.is_empty() && seconds >= 60.0) {
            return Err(invalid());
        }

        let mut total = 0.0;
        for (i, part) in whole.iter().enumerate() {
            let value: u64 = part.parse().map_err(|_| invalid())?;
            // Minutes field of HH:MM:SS is bounded; a leading field is not
            if i > 0 && value >= 60 {
                return Err(invalid());
            }
            total = total * 60.0 + value as f64;
        }

        Ok(total * 60.0 + seconds)
    }

    /// Format seconds as `MM:SS.mmm`, or `HH:MM:SS.mmm` past the hour
    pub fn format_time(&self, seconds: f64) -> String {
        let total_ms = if seconds.is_finite() && seconds > 0.0 {
            (seconds * 1000.0).round() as u64
        } else {
            0
        };
        let hours = total_ms / 3_600_000;
        let minutes = (total_ms % 3_600_000) / 60_000;
        let secs = (total_ms % 60_000) / 1000;
        let milliseconds = total_ms % 1000;

        if hours > 0 {
            format!(
                "{:02}:{:02}:{:02}.{:03}",
                hours, minutes, secs, milliseconds
            )
        } else {
            format!("{:02}:{:02}.{:03}", minutes, secs, milliseconds)
        }
    }
}
