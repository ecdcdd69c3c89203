//! Decoded AMI blocks

use crate::constants::LINE_TERMINATOR;
use crate::fields::{AmiField, EventName};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One decoded response or event block.
///
/// Fields keep the order in which they first appeared on the wire. A repeated
/// field name overwrites the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmiEvent {
    fields: IndexMap<String, String>,
}

impl AmiEvent {
    /// Create an empty block.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field by name (case-sensitive, as the PBX sends them).
    pub fn field(&self, name: impl AsRef<str>) -> Option<&str> {
        self.fields
            .get(name.as_ref())
            .map(|s| s.as_str())
    }

    /// Field value, or `""` when absent.
    pub fn field_or_default(&self, name: impl AsRef<str>) -> &str {
        self.field(name)
            .unwrap_or("")
    }

    /// First of `names` that is present and non-empty, or `""`.
    ///
    /// ```
    /// # use ami_queue_status::{AmiEvent, AmiField};
    /// let mut event = AmiEvent::new();
    /// event.set_field("Interface", "");
    /// event.set_field("Location", "PJSIP/102");
    /// assert_eq!(event.first_non_empty(&[AmiField::Interface, AmiField::Location]), "PJSIP/102");
    /// ```
    pub fn first_non_empty(&self, names: &[AmiField]) -> &str {
        names
            .iter()
            .filter_map(|name| self.field(name))
            .find(|value| !value.is_empty())
            .unwrap_or("")
    }

    /// Parse a field, falling back to `default` when it is absent or malformed.
    pub fn parse_or<T: FromStr>(&self, name: impl AsRef<str>, default: T) -> T {
        self.field(name)
            .and_then(|v| {
                v.trim()
                    .parse()
                    .ok()
            })
            .unwrap_or(default)
    }

    /// Set or overwrite a field.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields
            .insert(name.into(), value.into());
    }

    /// All fields in wire order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of decoded fields.
    pub fn len(&self) -> usize {
        self.fields
            .len()
    }

    /// True when no line of the block carried a field.
    pub fn is_empty(&self) -> bool {
        self.fields
            .is_empty()
    }

    /// Raw `Event` field.
    pub fn event_name(&self) -> Option<&str> {
        self.field(AmiField::Event)
    }

    /// Whether this block is the given event.
    pub fn is_event(&self, name: EventName) -> bool {
        self.event_name()
            .and_then(|n| {
                n.parse::<EventName>()
                    .ok()
            })
            == Some(name)
    }

    /// Raw `Response` field (`Success`, `Error`, `Goodbye`, ...).
    pub fn response(&self) -> Option<&str> {
        self.field(AmiField::Response)
    }

    /// `Response: Success`.
    pub fn is_success(&self) -> bool {
        self.response()
            .is_some_and(|r| r.eq_ignore_ascii_case("Success"))
    }

    /// `Response: Error`.
    pub fn is_error(&self) -> bool {
        self.response()
            .is_some_and(|r| r.eq_ignore_ascii_case("Error"))
    }

    /// `Message` field, or `""`.
    pub fn message(&self) -> &str {
        self.field_or_default(AmiField::Message)
    }

    /// Encode back to `Key: Value\r\n` lines followed by the block terminator.
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(LINE_TERMINATOR);
        }
        out.push_str(LINE_TERMINATOR);
        out
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AmiEvent {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut event = AmiEvent::new();
        for (k, v) in iter {
            event.set_field(k, v);
        }
        event
    }
}
