//! Transfer progress reporting.
//!
//! Sessions call [`ProgressReporter::report`] after every accepted data
//! message.  Reporting is purely observational; nothing a reporter does can
//! affect the transfer.

use std::fmt;

const KB: u64 = 1_000;
const MB: u64 = 1_000_000;

/// Observer of transfer progress.
pub trait ProgressReporter {
    fn report(&mut self, transferred: u64, total: u64);
}

impl<F: FnMut(u64, u64)> ProgressReporter for F {
    fn report(&mut self, transferred: u64, total: u64) {
        self(transferred, total)
    }
}

/// Discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&mut self, _transferred: u64, _total: u64) {}
}

/// Which way the bytes are flowing, for log wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Sending,
    Receiving,
}

/// Logs one `info` line per whole percent reached.
#[derive(Debug)]
pub struct LogProgress {
    direction: Direction,
    last_percent: Option<u64>,
}

impl LogProgress {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            last_percent: None,
        }
    }

    /// The line to log for this report, or `None` when this percentage was
    /// already logged.
    fn line(&mut self, transferred: u64, total: u64) -> Option<String> {
        let percent = percent(transferred, total);
        if self.last_percent == Some(percent) {
            return None;
        }
        self.last_percent = Some(percent);

        let verb = match self.direction {
            Direction::Sending => "sent",
            Direction::Receiving => "received",
        };
        let unit = Unit::for_size(total);
        Some(format!(
            "{}/{} {unit} {verb} ..... {percent}% complete",
            unit.scale(transferred),
            unit.scale(total),
        ))
    }
}

impl ProgressReporter for LogProgress {
    fn report(&mut self, transferred: u64, total: u64) {
        if let Some(line) = self.line(transferred, total) {
            log::info!("{line}");
        }
    }
}

fn percent(transferred: u64, total: u64) -> u64 {
    if total == 0 {
        return 100;
    }
    (transferred.min(total) as u128 * 100 / total as u128) as u64
}

/// Decimal size unit picked from the total transfer size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum Unit {
    B,
    KB,
    MB,
}

impl Unit {
    pub fn for_size(bytes: u64) -> Self {
        if bytes < KB {
            Unit::B
        } else if bytes < MB {
            Unit::KB
        } else {
            Unit::MB
        }
    }

    pub fn scale(self, bytes: u64) -> u64 {
        match self {
            Unit::B => bytes,
            Unit::KB => bytes / KB,
            Unit::MB => bytes / MB,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Unit::B => "B",
            Unit::KB => "kB",
            Unit::MB => "MB",
        })
    }
}

/// Human-readable size, e.g. `5 kB`.
pub fn human_size(bytes: u64) -> String {
    let unit = Unit::for_size(bytes);
    format!("{} {unit}", unit.scale(bytes))
}
