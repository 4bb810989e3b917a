use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Health status recorded for a monitored target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Up,
    Down,
    #[default]
    Unknown,
}

impl Status {
    pub const ALL: [Status; 3] = [Status::Up, Status::Down, Status::Unknown];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "UP",
            Status::Down => "DOWN",
            Status::Unknown => "UNKNOWN",
        }
    }

    /// Classify an HTTP response code. 1xx-3xx is UP, everything else DOWN.
    pub fn from_status_code(code: u16) -> Self {
        if (100..400).contains(&code) { Status::Up } else { Status::Down }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status value: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "UP" => Ok(Status::Up),
            "DOWN" => Ok(Status::Down),
            "UNKNOWN" => Ok(Status::Unknown),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

/// Outcome of the transition predicate for one evaluated check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Evaluation {
    pub old_status: Status,
    pub new_status: Status,
    pub transitioned: bool,
}

/// Counters reported after every scheduler tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    /// Targets loaded from the store
    pub examined: usize,
    /// Targets whose interval had elapsed
    pub due: usize,
    /// Cycles that committed a history row
    pub checked: usize,
    pub transitions: usize,
    /// Cycles abandoned because persistence failed
    pub failed: usize,
    /// Due targets skipped because a check was already in flight
    pub skipped_in_flight: usize,
}

impl fmt::Display for TickSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "examined={} due={} checked={} transitions={} failed={} skipped_in_flight={}",
            self.examined,
            self.due,
            self.checked,
            self.transitions,
            self.failed,
            self.skipped_in_flight
        )
    }
}
