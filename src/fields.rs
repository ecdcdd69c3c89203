//! Typed AMI field and event names.

/// Error returned when parsing an unrecognized AMI field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseAmiFieldError(pub String);

impl std::fmt::Display for ParseAmiFieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown AMI field: {}", self.0)
    }
}

impl std::error::Error for ParseAmiFieldError {}

/// Error returned when parsing an unrecognized AMI event name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEventNameError(pub String);

impl std::fmt::Display for ParseEventNameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown AMI event: {}", self.0)
    }
}

impl std::error::Error for ParseEventNameError {}

define_wire_enum! {
    error_type: ParseAmiFieldError,
    /// Field names read from `Status`, `QueueParams` and `QueueMember` blocks.
    ///
    /// Use with [`AmiEvent::field()`](crate::AmiEvent::field) for typed lookups.
    pub enum AmiField {
        Event => "Event",
        Response => "Response",
        Message => "Message",
        Ping => "Ping",
        Channel => "Channel",
        CallerIdNum => "CallerIDNum",
        CallerIdName => "CallerIDName",
        ConnectedLineNum => "ConnectedLineNum",
        ConnectedLineName => "ConnectedLineName",
        Application => "Application",
        Data => "Data",
        ChannelStateDesc => "ChannelStateDesc",
        Queue => "Queue",
        Strategy => "Strategy",
        Calls => "Calls",
        Completed => "Completed",
        Abandoned => "Abandoned",
        ServiceLevelPerf => "ServiceLevelPerf",
        Name => "Name",
        MemberName => "MemberName",
        Interface => "Interface",
        Location => "Location",
        Status => "Status",
        Paused => "Paused",
        Penalty => "Penalty",
        CallsTaken => "CallsTaken",
    }
}

define_wire_enum! {
    error_type: ParseEventNameError,
    /// `Event:` values this client reacts to.
    pub enum EventName {
        Status => "Status",
        StatusComplete => "StatusComplete",
        QueueParams => "QueueParams",
        QueueMember => "QueueMember",
        QueueStatusComplete => "QueueStatusComplete",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire() {
        assert_eq!(AmiField::CallerIdNum.to_string(), "CallerIDNum");
        assert_eq!(AmiField::ServiceLevelPerf.to_string(), "ServiceLevelPerf");
        assert_eq!(
            EventName::QueueStatusComplete.to_string(),
            "QueueStatusComplete"
        );
    }

    #[test]
    fn as_ref_str() {
        let f: &str = AmiField::ConnectedLineNum.as_ref();
        assert_eq!(f, "ConnectedLineNum");
    }

    #[test]
    fn from_str_case_insensitive() {
        assert_eq!("callerid num".parse::<AmiField>().ok(), None);
        assert_eq!(
            "calleridnum".parse::<AmiField>(),
            Ok(AmiField::CallerIdNum)
        );
        assert_eq!(
            "QUEUEMEMBER".parse::<EventName>(),
            Ok(EventName::QueueMember)
        );
    }

    #[test]
    fn from_str_trims_key() {
        assert_eq!(" Interface ".parse::<AmiField>(), Ok(AmiField::Interface));
    }

    #[test]
    fn every_name_parses_back() {
        for field in AmiField::ALL {
            assert_eq!(
                field
                    .as_str()
                    .to_ascii_lowercase()
                    .parse::<AmiField>(),
                Ok(*field)
            );
        }
        assert!(EventName::ALL.contains(&EventName::StatusComplete));
    }

    #[test]
    fn from_str_unknown() {
        let err = "AgentCalled".parse::<EventName>();
        assert_eq!(
            err.unwrap_err()
                .to_string(),
            "unknown AMI event: AgentCalled"
        );
    }
}
