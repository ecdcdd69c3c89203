//! Manager actions and their wire encoding

use crate::{
    constants::LINE_TERMINATOR,
    error::{AmiError, AmiResult},
};
use std::fmt;

/// Validate that a user-provided string contains no line breaks.
///
/// Actions are line-delimited; an embedded CR or LF would let a caller
/// append arbitrary fields or a second action.
fn validate_no_newlines(s: &str, context: &str) -> AmiResult<()> {
    if s.contains('\n') || s.contains('\r') {
        return Err(AmiError::protocol_error(format!(
            "{} must not contain newlines",
            context
        )));
    }
    Ok(())
}

/// Parameters of an `Originate` action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Originate {
    /// Channel to dial first (the supervisor's device).
    pub channel: String,
    /// Dialplan application run once the channel answers.
    pub application: String,
    /// Application argument string.
    pub data: String,
    /// Full caller ID, e.g. `"Spy: PJSIP/102" <104>`.
    pub caller_id: String,
    /// `NAME=value` channel variables.
    pub variables: Vec<String>,
    /// Return as soon as the originate is queued.
    pub run_async: bool,
}

/// Manager actions sent by this client
#[derive(Clone)]
pub enum AmiAction {
    /// Authenticate; `events_off` suppresses unsolicited event traffic.
    Login {
        username: String,
        secret: String,
        events_off: bool,
    },
    /// Liveness probe
    Ping,
    /// List active channels, ends with `Event: StatusComplete`
    Status,
    /// List queues and members, ends with `Event: QueueStatusComplete`
    QueueStatus,
    /// Start a new call leg running an application
    Originate(Originate),
    /// Close the manager session
    Logoff,
}

impl fmt::Debug for AmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AmiAction::Login {
                username,
                events_off,
                ..
            } => f
                .debug_struct("Login")
                .field("username", username)
                .field("secret", &"[REDACTED]")
                .field("events_off", events_off)
                .finish(),
            AmiAction::Ping => write!(f, "Ping"),
            AmiAction::Status => write!(f, "Status"),
            AmiAction::QueueStatus => write!(f, "QueueStatus"),
            AmiAction::Originate(originate) => f
                .debug_tuple("Originate")
                .field(originate)
                .finish(),
            AmiAction::Logoff => write!(f, "Logoff"),
        }
    }
}

impl AmiAction {
    /// Action name as sent in the `Action:` field.
    pub fn name(&self) -> &'static str {
        match self {
            AmiAction::Login { .. } => "Login",
            AmiAction::Ping => "Ping",
            AmiAction::Status => "Status",
            AmiAction::QueueStatus => "QueueStatus",
            AmiAction::Originate(_) => "Originate",
            AmiAction::Logoff => "Logoff",
        }
    }

    fn format_action(name: &str, fields: &[(&str, &str)]) -> String {
        let mut result = format!("Action: {}{}", name, LINE_TERMINATOR);
        for (key, value) in fields {
            result.push_str(key);
            result.push_str(": ");
            result.push_str(value);
            result.push_str(LINE_TERMINATOR);
        }
        result.push_str(LINE_TERMINATOR);
        result
    }

    /// Validate all user-supplied fields, then convert to wire format.
    pub fn to_wire_format(&self) -> AmiResult<String> {
        match self {
            AmiAction::Login {
                username,
                secret,
                events_off,
            } => {
                validate_no_newlines(username, "username")?;
                validate_no_newlines(secret, "secret")?;
                let events = if *events_off { "off" } else { "on" };
                Ok(Self::format_action(
                    "Login",
                    &[
                        ("Username", username.as_str()),
                        ("Secret", secret.as_str()),
                        ("Events", events),
                    ],
                ))
            }
            AmiAction::Ping => Ok(Self::format_action("Ping", &[])),
            AmiAction::Status => Ok(Self::format_action("Status", &[])),
            AmiAction::QueueStatus => Ok(Self::format_action("QueueStatus", &[])),
            AmiAction::Originate(o) => {
                validate_no_newlines(&o.channel, "originate channel")?;
                validate_no_newlines(&o.application, "originate application")?;
                validate_no_newlines(&o.data, "originate data")?;
                validate_no_newlines(&o.caller_id, "originate caller id")?;
                for v in &o.variables {
                    validate_no_newlines(v, "originate variable")?;
                }
                let mut fields: Vec<(&str, &str)> = vec![
                    ("Channel", o.channel.as_str()),
                    ("Application", o.application.as_str()),
                    ("Data", o.data.as_str()),
                    ("CallerID", o.caller_id.as_str()),
                ];
                for v in &o.variables {
                    fields.push(("Variable", v.as_str()));
                }
                if o.run_async {
                    fields.push(("Async", "true"));
                }
                Ok(Self::format_action("Originate", &fields))
            }
            AmiAction::Logoff => Ok(Self::format_action("Logoff", &[])),
        }
    }
}
