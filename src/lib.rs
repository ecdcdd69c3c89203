//! Asterisk Manager Interface (AMI) client for live call-queue dashboards
//!
//! This crate keeps one authenticated AMI session open to a PBX, polls active
//! channels and queue membership, and merges them into a per-queue view of
//! each agent: availability, who they are talking to, and whether a
//! supervisor is listening in. It can also start a supervisor monitoring
//! call (ChanSpy) on an agent.
//!
//! # Architecture
//!
//! - [`QueueStatusClient`]: long-lived handle; every operation holds the
//!   session lock for its full request/response cycle
//! - [`AmiSession`]: the socket, reused while it answers `Ping` and
//!   reconnected lazily when it does not
//! - [`correlate()`]: pure merge of `Status` and `QueueStatus` blocks
//! - [`MemberDirectory`]: optional source of display names (MySQL via
//!   [`SqlMemberDirectory`], or a fixed map)
//!
//! # Examples
//!
//! ## Polling queue status
//!
//! ```rust,no_run
//! use ami_queue_status::{AmiConfig, QueueStatusClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ami_queue_status::AmiError> {
//!     let client = QueueStatusClient::new(AmiConfig::from_env());
//!
//!     for queue in client.fetch_queue_status().await? {
//!         println!("{}: {} waiting", queue.name, queue.calls_waiting);
//!         for member in &queue.members {
//!             println!("  {} ({}) {}", member.name, member.number, member.status);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Names from the PBX database
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ami_queue_status::{AmiConfig, DirectoryConfig, QueueStatusClient, SqlMemberDirectory};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = DirectoryConfig::from_env().ok_or("DB_HOST and DB_NAME must be set")?;
//!     let directory = Arc::new(SqlMemberDirectory::connect_lazy(&db)?);
//!     let client = QueueStatusClient::with_directory(AmiConfig::from_env(), directory);
//!
//!     // Degrades to an empty list if the PBX is unreachable
//!     let queues = client.get_queue_status().await;
//!     println!("{}", serde_json::to_string_pretty(&queues)?);
//!     Ok(())
//! }
//! ```
//!
//! ## Supervisor monitoring
//!
//! ```rust,no_run
//! use ami_queue_status::{AmiConfig, QueueStatusClient, SpyMode};
//!
//! #[tokio::main]
//! async fn main() {
//!     let client = QueueStatusClient::new(AmiConfig::default());
//!     let outcome = client.trigger_monitor("104", "PJSIP/102", SpyMode::Whisper).await;
//!     println!("{}: {}", if outcome.is_success() { "ok" } else { "failed" }, outcome.message);
//! }
//! ```

#[macro_use]
mod macros;

pub mod client;
pub mod config;
pub mod connection;
pub mod correlate;
pub mod directory;
pub mod error;
pub mod event;
pub mod fields;
pub mod monitor;

pub(crate) mod command;
pub mod constants;
pub(crate) mod protocol;

pub use client::QueueStatusClient;
pub use command::{AmiAction, Originate};
pub use config::{AmiConfig, DirectoryConfig};
pub use connection::{AmiSession, ConnectionState};
pub use constants::DEFAULT_AMI_PORT;
pub use correlate::{
    correlate, ChannelInfo, ConnectedParty, MemberStatus, MonitorMode, MonitorStatus, Queue,
    QueueMember,
};
pub use directory::{
    load_member_names, MemberDirectory, MemberNames, SqlMemberDirectory, StaticMemberDirectory,
};
pub use error::{AmiError, AmiResult};
pub use event::AmiEvent;
pub use fields::{AmiField, EventName, ParseAmiFieldError, ParseEventNameError};
pub use monitor::{MonitorOutcome, OutcomeStatus, ParseSpyModeError, SpyMode};
pub use protocol::decode;
