//! Merge channel status and queue membership into per-queue member views.
//!
//! Everything here is pure: the inputs are blocks already read off the wire
//! and the name tables already loaded, so each fallback chain can be tested
//! on its own.
//!
//! Member-to-channel matching is a substring test of the member interface
//! against the channel name. `PJSIP/10` therefore also matches
//! `PJSIP/102-00000001`; this mirrors how the PBX admin UI has always
//! matched and is kept as-is.

use crate::constants::{GENERIC_OBSERVER, MONITOR_APPLICATION, UNKNOWN_EXTENSION, UNKNOWN_MARKER};
use crate::directory::MemberNames;
use crate::event::AmiEvent;
use crate::fields::{AmiField, EventName};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("valid regex"));
static OBSERVER_IN_CHANNEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:extension-)?(\d+)").expect("valid regex"));

/// First run of decimal digits in `s`.
pub fn first_digits(s: &str) -> Option<&str> {
    DIGITS
        .find(s)
        .map(|m| m.as_str())
}

fn is_known(value: &str) -> bool {
    !value.is_empty() && value != UNKNOWN_MARKER
}

/// Member availability shown to supervisors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Online,
    Busy,
    Paused,
    Offline,
}

impl MemberStatus {
    /// Map the `Paused` flag and numeric device `Status` to a label.
    ///
    /// Paused overrides everything. Otherwise 1 (not in use) and 6 (ringing)
    /// are online; 2 (in use), 3 (busy), 7 (ring+inuse) and 8 (on hold) are
    /// busy; anything else is offline.
    pub fn from_codes(paused: bool, status: i64) -> Self {
        if paused {
            return MemberStatus::Paused;
        }
        match status {
            1 | 6 => MemberStatus::Online,
            2 | 3 | 7 | 8 => MemberStatus::Busy,
            _ => MemberStatus::Offline,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberStatus::Online => "online",
            MemberStatus::Busy => "busy",
            MemberStatus::Paused => "paused",
            MemberStatus::Offline => "offline",
        }
    }
}

impl fmt::Display for MemberStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a supervisor is attached to a member's call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitorMode {
    Listen,
    Whisper,
    Barge,
    #[serde(rename = "Interactive Spy")]
    InteractiveSpy,
}

impl MonitorMode {
    /// Detect the mode from ChanSpy option letters in the application data.
    ///
    /// Checked in order: `w` whisper, `b` barge, `d` interactive; plain
    /// listen when none is present. All checks ignore case.
    pub fn from_application_data(data: &str) -> Self {
        let lower = data.to_ascii_lowercase();
        if lower.contains('w') {
            MonitorMode::Whisper
        } else if lower.contains('b') {
            MonitorMode::Barge
        } else if lower.contains('d') {
            MonitorMode::InteractiveSpy
        } else {
            MonitorMode::Listen
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorMode::Listen => "Listen",
            MonitorMode::Whisper => "Whisper",
            MonitorMode::Barge => "Barge",
            MonitorMode::InteractiveSpy => "Interactive Spy",
        }
    }
}

impl fmt::Display for MonitorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The far end of a member's active call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedParty {
    pub num: String,
    pub name: String,
}

/// A supervisor currently spying on a member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorStatus {
    #[serde(rename = "spyer")]
    pub observer: String,
    pub mode: MonitorMode,
}

/// One agent within a queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMember {
    pub name: String,
    pub number: String,
    pub interface: String,
    pub status: MemberStatus,
    pub penalty: i64,
    pub calls: i64,
    pub connected_party: Option<ConnectedParty>,
    #[serde(rename = "spyStatus")]
    pub monitor_status: Option<MonitorStatus>,
}

/// A call queue with its summary counters and members.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    pub name: String,
    pub strategy: String,
    pub calls_waiting: i64,
    pub answered: i64,
    pub abandoned: i64,
    pub service_level: f64,
    pub members: Vec<QueueMember>,
}

impl Queue {
    /// Start a queue from a `QueueParams` block.
    pub fn from_params(event: &AmiEvent) -> Self {
        let strategy = match event.field_or_default(AmiField::Strategy) {
            "" => "unknown",
            s => s,
        };
        Self {
            name: event
                .field_or_default(AmiField::Queue)
                .to_string(),
            strategy: strategy.to_string(),
            calls_waiting: event.parse_or(AmiField::Calls, 0),
            answered: event.parse_or(AmiField::Completed, 0),
            abandoned: event.parse_or(AmiField::Abandoned, 0),
            service_level: event.parse_or(AmiField::ServiceLevelPerf, 0.0),
            members: Vec::new(),
        }
    }

    /// Order members by penalty, then name.
    pub fn sort_members(&mut self) {
        self.members
            .sort_by(|a, b| {
                a.penalty
                    .cmp(&b.penalty)
                    .then_with(|| {
                        a.name
                            .cmp(&b.name)
                    })
            });
    }
}

/// One active channel from a `Status` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    /// Lower-cased channel name, e.g. `pjsip/102-0000002a`.
    pub key: String,
    /// First known of connected-line number and caller-ID number.
    pub num: String,
    /// Name paired with `num`, blank when unknown.
    pub name: String,
    pub application: String,
    pub data: String,
    pub state: String,
    pub connected_line: String,
    pub caller_id: String,
}

impl ChannelInfo {
    /// Build from an `Event: Status` block; other blocks yield `None`.
    pub fn from_status_event(event: &AmiEvent) -> Option<Self> {
        if !event.is_event(EventName::Status) {
            return None;
        }
        let connected_line = event.field_or_default(AmiField::ConnectedLineNum);
        let caller_id = event.field_or_default(AmiField::CallerIdNum);
        let (num, name) = if is_known(connected_line) {
            (
                connected_line,
                event.field_or_default(AmiField::ConnectedLineName),
            )
        } else if is_known(caller_id) {
            (caller_id, event.field_or_default(AmiField::CallerIdName))
        } else {
            ("", "")
        };
        let name = if is_known(name) { name } else { "" };

        Some(Self {
            key: event
                .field_or_default(AmiField::Channel)
                .to_lowercase(),
            num: num.to_string(),
            name: name.to_string(),
            application: event
                .field_or_default(AmiField::Application)
                .to_string(),
            data: event
                .field_or_default(AmiField::Data)
                .to_string(),
            state: event
                .field_or_default(AmiField::ChannelStateDesc)
                .to_string(),
            connected_line: connected_line.to_string(),
            caller_id: caller_id.to_string(),
        })
    }

    /// Whether this leg is a supervisor's spy session rather than a call.
    pub fn is_monitor(&self) -> bool {
        self.application == MONITOR_APPLICATION
    }
}

/// Collect channels from the blocks of a `Status` sequence.
pub fn channels_from_events(events: &[AmiEvent]) -> Vec<ChannelInfo> {
    events
        .iter()
        .filter_map(ChannelInfo::from_status_event)
        .collect()
}

/// Extension digits from the interface, else from the PBX-supplied name.
pub fn member_extension<'a>(interface: &'a str, ami_name: &'a str) -> Option<&'a str> {
    first_digits(interface).or_else(|| first_digits(ami_name))
}

/// Display name: directory by interface, directory by extension, PBX name,
/// then the bare extension.
pub fn resolve_member_name(
    names: &MemberNames,
    interface: &str,
    extension: &str,
    ami_name: &str,
) -> String {
    names
        .by_interface(interface)
        .or_else(|| names.by_extension(extension))
        .filter(|n| !n.is_empty())
        .or(Some(ami_name).filter(|n| !n.is_empty()))
        .unwrap_or(extension)
        .to_string()
}

/// Who the member is talking to on `channel`.
///
/// Prefers the connected-line number. Falls back to the caller-ID number when
/// that is blank, unknown, or the member's own extension. If the result is
/// still the member itself, the channel's recorded number is shown instead.
/// Returns `None` only when the channel carried no number at all.
pub fn connected_party(channel: &ChannelInfo, extension: &str) -> Option<ConnectedParty> {
    let mut other = channel
        .connected_line
        .as_str();
    if other.is_empty() || other == extension || other == UNKNOWN_MARKER {
        other = channel
            .caller_id
            .as_str();
    }
    let num = if is_known(other) && other != extension {
        other
    } else {
        channel
            .num
            .as_str()
    };
    if num.is_empty() {
        return None;
    }
    let name = if num == channel.num {
        channel
            .name
            .clone()
    } else {
        String::new()
    };
    Some(ConnectedParty {
        num: num.to_string(),
        name,
    })
}

/// Extension of the supervisor on a spy channel.
pub fn observer_extension(channel: &ChannelInfo) -> String {
    if is_known(&channel.num) {
        return channel
            .num
            .clone();
    }
    OBSERVER_IN_CHANNEL
        .captures(&channel.key)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .to_string()
        })
        .unwrap_or_else(|| GENERIC_OBSERVER.to_string())
}

/// Spy session targeting `interface`, if `channel` is one.
pub fn monitor_status(channel: &ChannelInfo, interface: &str) -> Option<MonitorStatus> {
    if interface.is_empty() || !channel.is_monitor() || !channel
        .data
        .contains(interface)
    {
        return None;
    }
    Some(MonitorStatus {
        observer: observer_extension(channel),
        mode: MonitorMode::from_application_data(&channel.data),
    })
}

/// Build one member from a `QueueMember` block.
pub fn member_from_event(
    event: &AmiEvent,
    channels: &[ChannelInfo],
    names: &MemberNames,
) -> QueueMember {
    let paused = event.parse_or(AmiField::Paused, 0i64) == 1;
    let status = MemberStatus::from_codes(paused, event.parse_or(AmiField::Status, 0));

    let interface = event.first_non_empty(&[AmiField::Interface, AmiField::Location]);
    let ami_name = event.first_non_empty(&[AmiField::Name, AmiField::MemberName]);
    let extension = member_extension(interface, ami_name).unwrap_or("");
    let name = resolve_member_name(names, interface, extension, ami_name);

    let interface_key = interface.to_lowercase();
    let mut party = None;
    let mut monitor = None;
    for channel in channels {
        if !interface.is_empty() && channel
            .key
            .contains(&interface_key)
            && !channel.is_monitor()
        {
            party = connected_party(channel, extension);
        }
        if let Some(status) = monitor_status(channel, interface) {
            monitor = Some(status);
        }
    }

    QueueMember {
        name,
        number: if extension.is_empty() {
            UNKNOWN_EXTENSION.to_string()
        } else {
            extension.to_string()
        },
        interface: interface.to_string(),
        status,
        penalty: event.parse_or(AmiField::Penalty, 0),
        calls: event.parse_or(AmiField::CallsTaken, 0),
        connected_party: party,
        monitor_status: monitor,
    }
}

/// Merge the blocks of a `QueueStatus` sequence with the channel list.
///
/// Queues appear in the order their `QueueParams` arrived. Members of a queue
/// that was never announced are dropped.
pub fn correlate(
    channels: &[ChannelInfo],
    queue_events: &[AmiEvent],
    names: &MemberNames,
) -> Vec<Queue> {
    let mut queues: IndexMap<String, Queue> = IndexMap::new();
    for event in queue_events {
        if event.is_event(EventName::QueueParams) {
            let queue = Queue::from_params(event);
            queues.insert(
                queue
                    .name
                    .clone(),
                queue,
            );
        } else if event.is_event(EventName::QueueMember) {
            let queue_name = event.field_or_default(AmiField::Queue);
            if let Some(queue) = queues.get_mut(queue_name) {
                queue
                    .members
                    .push(member_from_event(event, channels, names));
            }
        }
    }

    queues
        .into_values()
        .map(|mut queue| {
            queue.sort_members();
            queue
        })
        .collect()
}
