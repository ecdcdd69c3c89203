//! Protocol constants and configuration defaults

/// Default Asterisk manager port
pub const DEFAULT_AMI_PORT: u16 = 5038;

/// Default manager host
pub const DEFAULT_AMI_HOST: &str = "127.0.0.1";

/// Default manager credentials (FreePBX factory values)
pub const DEFAULT_AMI_USER: &str = "admin";
pub const DEFAULT_AMI_SECRET: &str = "amp111";

/// Protocol block terminator: every action, response and event ends with an empty line
pub const BLOCK_TERMINATOR: &str = "\r\n\r\n";
pub const LINE_TERMINATOR: &str = "\r\n";

/// Largest block accepted from the PBX (1MB). A `Status` reply on a busy box is
/// many blocks, never one this large; hitting it means the terminator was lost.
pub const MAX_BLOCK_SIZE: usize = 1024 * 1024;

/// TCP connect timeout in milliseconds
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5000;

/// Per-block read timeout while draining a command sequence
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 10_000;

/// Liveness probe (Ping) round-trip timeout
pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 2000;

/// Originate acknowledgment timeout
pub const DEFAULT_ORIGINATE_TIMEOUT_MS: u64 = 3000;

/// Bound on one member directory lookup
pub const DEFAULT_DIRECTORY_TIMEOUT_MS: u64 = 3000;

/// Channel technology prefix used to dial the supervisor's phone
pub const DEFAULT_SUPERVISOR_TECHNOLOGY: &str = "PJSIP";

/// Dialplan application that implements listen/whisper/barge
pub const MONITOR_APPLICATION: &str = "ChanSpy";

/// ChanSpy options for triggered monitoring: `d` (DTMF mode switching 4/5/6) and `q` (quiet)
pub const MONITOR_OPTIONS: &str = "dq";

/// Placeholder the PBX uses for an absent caller ID
pub const UNKNOWN_MARKER: &str = "<unknown>";

/// Member number shown when neither interface nor name carries digits
pub const UNKNOWN_EXTENSION: &str = "???";

/// Observer label when the spying channel carries no usable number
pub const GENERIC_OBSERVER: &str = "Supervisor";
