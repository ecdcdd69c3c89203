//! Member display names from the `queue_members` table

use crate::config::DirectoryConfig;
use crate::correlate::first_digits;
use crate::error::AmiResult;
use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlPoolOptions};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Source of `(interface, display name)` pairs.
#[async_trait]
pub trait MemberDirectory: Send + Sync {
    /// Fetch every configured member row.
    async fn load_members(&self) -> AmiResult<Vec<(String, String)>>;
}

/// Lookup tables built from one directory load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberNames {
    by_interface: HashMap<String, String>,
    by_extension: HashMap<String, String>,
}

impl MemberNames {
    /// Tables with no entries; every lookup misses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Index rows by interface and by the first digit run of the interface.
    ///
    /// Rows with a blank interface or name are skipped. When two interfaces
    /// share an extension the later row wins.
    pub fn from_rows<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut names = Self::default();
        for (interface, name) in rows {
            let interface = interface.into();
            let name = name.into();
            if interface.is_empty() || name.is_empty() {
                continue;
            }
            if let Some(ext) = first_digits(&interface) {
                names
                    .by_extension
                    .insert(ext.to_string(), name.clone());
            }
            names
                .by_interface
                .insert(interface, name);
        }
        names
    }

    /// Exact interface match, e.g. `PJSIP/102`.
    pub fn by_interface(&self, interface: &str) -> Option<&str> {
        self.by_interface
            .get(interface)
            .map(|s| s.as_str())
    }

    /// Match on bare extension digits, e.g. `102`.
    pub fn by_extension(&self, extension: &str) -> Option<&str> {
        self.by_extension
            .get(extension)
            .map(|s| s.as_str())
    }

    /// Number of interfaces known.
    pub fn len(&self) -> usize {
        self.by_interface
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_interface
            .is_empty()
    }
}

/// Load names, degrading to empty tables when the directory fails or does
/// not answer within `limit`.
pub async fn load_member_names(directory: &dyn MemberDirectory, limit: Duration) -> MemberNames {
    match timeout(limit, directory.load_members()).await {
        Ok(Ok(rows)) => {
            let names = MemberNames::from_rows(rows);
            debug!("Loaded {} member names from directory", names.len());
            names
        }
        Ok(Err(e)) => {
            warn!("Member directory unavailable, using protocol names: {}", e);
            MemberNames::empty()
        }
        Err(_) => {
            warn!(
                "Member directory timed out after {}ms, using protocol names",
                limit.as_millis()
            );
            MemberNames::empty()
        }
    }
}

/// Fixed in-memory rows. `StaticMemberDirectory::default()` resolves nothing.
#[derive(Debug, Clone, Default)]
pub struct StaticMemberDirectory {
    rows: Vec<(String, String)>,
}

impl StaticMemberDirectory {
    pub fn new<I, K, V>(rows: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[async_trait]
impl MemberDirectory for StaticMemberDirectory {
    async fn load_members(&self) -> AmiResult<Vec<(String, String)>> {
        Ok(self
            .rows
            .clone())
    }
}

/// Reads `queue_members` from the PBX's MySQL/MariaDB database.
#[derive(Clone)]
pub struct SqlMemberDirectory {
    pool: MySqlPool,
}

impl std::fmt::Debug for SqlMemberDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlMemberDirectory")
            .finish_non_exhaustive()
    }
}

impl SqlMemberDirectory {
    /// Create a lazily connecting pool; nothing touches the network until the
    /// first lookup.
    pub fn connect_lazy(config: &DirectoryConfig) -> AmiResult<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(3))
            .connect_lazy(&config.database_url)?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MemberDirectory for SqlMemberDirectory {
    async fn load_members(&self) -> AmiResult<Vec<(String, String)>> {
        let rows: Vec<(Option<String>, Option<String>)> =
            sqlx::query_as("SELECT interface, membername FROM queue_members")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(interface, name)| (interface.unwrap_or_default(), name.unwrap_or_default()))
            .collect())
    }
}
