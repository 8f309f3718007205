// Typed settings for the concur tools, every field defaulted so a partial
// (or absent) concur.toml still yields a usable configuration.

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use std::{path::PathBuf, str::FromStr, time::Duration};

pub const DEFAULT_TALLY_FILES: [&str; 2] = ["./data/tallytest.txt", "./data/tallytest1.txt"];
pub const DEFAULT_GATE_WORKERS: usize = 12;
pub const DEFAULT_GATE_HOLD: Duration = Duration::from_millis(500);
pub const DEFAULT_RELAY_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_RELAY_DEADLINE: Duration = Duration::from_secs(10);

/// How the tally treats files that could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TallyMode {
    /// Any failed file fails the whole tally; no report is produced.
    #[default]
    Strict,

    /// Failed files are listed next to a best-effort report of the rest.
    Lenient,
}

impl FromStr for TallyMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(format!("unknown tally mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub tally: TallySettings,
    pub gate: GateSettings,
    pub relay: RelaySettings,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TallySettings {
    pub files: Vec<PathBuf>,
    pub mode: TallyMode,

    /// Words are reported once their count reaches this value.
    pub min_count: u64,

    #[serde(rename = "deadline_secs")]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub deadline: Option<Duration>,
}

impl Default for TallySettings {
    fn default() -> Self {
        Self {
            files: DEFAULT_TALLY_FILES.iter().map(PathBuf::from).collect(),
            mode: TallyMode::default(),
            min_count: 2,
            deadline: None,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    pub workers: usize,

    #[serde(rename = "hold_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub hold: Duration,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_GATE_WORKERS,
            hold: DEFAULT_GATE_HOLD,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    pub chunk_size: usize,

    #[serde(rename = "deadline_secs")]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub deadline: Option<Duration>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_RELAY_CHUNK_SIZE,
            deadline: Some(DEFAULT_RELAY_DEADLINE),
        }
    }
}
