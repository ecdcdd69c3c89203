//! Supervisor monitoring via `Originate` into ChanSpy

use crate::command::Originate;
use crate::config::AmiConfig;
use crate::constants::{MONITOR_APPLICATION, MONITOR_OPTIONS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an unrecognized monitoring mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseSpyModeError(pub String);

impl fmt::Display for ParseSpyModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown monitor mode '{}': expected spy, listen, whisper or barge",
            self.0
        )
    }
}

impl std::error::Error for ParseSpyModeError {}

/// Mode a supervisor asks for.
///
/// The call is always placed with DTMF mode switching enabled, so the
/// supervisor can change mode from the handset (4 listen, 5 whisper,
/// 6 barge). The requested mode only labels the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SpyMode {
    #[default]
    Spy,
    Whisper,
    Barge,
}

impl SpyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpyMode::Spy => "spy",
            SpyMode::Whisper => "whisper",
            SpyMode::Barge => "barge",
        }
    }
}

impl fmt::Display for SpyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpyMode {
    type Err = ParseSpyModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s
            .trim()
            .to_ascii_lowercase()
            .as_str()
        {
            "spy" | "listen" => Ok(SpyMode::Spy),
            "whisper" => Ok(SpyMode::Whisper),
            "barge" => Ok(SpyMode::Barge),
            _ => Err(ParseSpyModeError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Error,
}

/// Result of a monitoring request, shaped for the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorOutcome {
    pub status: OutcomeStatus,
    pub message: String,
}

impl MonitorOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OutcomeStatus::Success
    }
}

/// Originate that rings the supervisor and bridges them into ChanSpy on
/// `target_interface`.
pub fn build_originate(
    config: &AmiConfig,
    supervisor_extension: &str,
    target_interface: &str,
) -> Originate {
    Originate {
        channel: format!(
            "{}/{}",
            config.supervisor_technology, supervisor_extension
        ),
        application: MONITOR_APPLICATION.to_string(),
        data: format!("{},{}", target_interface, MONITOR_OPTIONS),
        caller_id: format!("\"Spy: {}\" <{}>", target_interface, supervisor_extension),
        variables: vec!["VAR1=SpyAction".to_string()],
        run_async: true,
    }
}

/// Judge the raw acknowledgment block of the Originate.
///
/// `Success` or `Queued` anywhere in the block counts as accepted.
pub fn evaluate_response(raw: &str, mode: SpyMode, target_interface: &str) -> MonitorOutcome {
    if raw.contains("Success") || raw.contains("Queued") {
        MonitorOutcome::success(format!("Spy {} initiated for {}", mode, target_interface))
    } else {
        MonitorOutcome::error(format!("AMI error: {}", raw.trim()))
    }
}
