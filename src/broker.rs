//! Persistence of the linked broker credential.
//!
//! The service keeps exactly one broker link. Linking again replaces the stored
//! fields and refreshes `connected_at`; there is no per-user scoping.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::Row;
use sqlx::SqlitePool;
use tokio::sync::RwLock;

use crate::error::Error;
use crate::error::Result;

/// Request to link a broker. Every field is required and non-empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinkBroker {
    #[serde(default)]
    pub broker_name: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub auth_token: Option<String>,
}

impl LinkBroker {
    /// Validate and stamp the request
    pub fn into_link(self, connected_at: DateTime<Utc>) -> Result<BrokerLink> {
        match (non_empty(self.broker_name), non_empty(self.client_id), non_empty(self.auth_token)) {
            (Some(broker_name), Some(client_id), Some(auth_token)) => Ok(BrokerLink {
                broker_name,
                client_id,
                auth_token,
                connected_at,
            }),
            _ => Err(Error::InvalidRequest(
                "broker_name, client_id and auth_token required".to_string(),
            )),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrokerLink {
    pub broker_name: String,
    pub client_id: String,
    pub auth_token: String,
    pub connected_at: DateTime<Utc>,
}

/// Storage for the single broker link
#[async_trait]
pub trait BrokerStore: Send + Sync {
    /// Insert the link, or overwrite the existing one
    async fn upsert(&self, link: BrokerLink) -> Result<()>;

    async fn get(&self) -> Result<Option<BrokerLink>>;
}

/// Process-local store, used when no database is configured
#[derive(Debug, Default)]
pub struct InMemoryBrokerStore {
    link: RwLock<Option<BrokerLink>>,
}

#[async_trait]
impl BrokerStore for InMemoryBrokerStore {
    async fn upsert(&self, link: BrokerLink) -> Result<()> {
        *self.link.write().await = Some(link);
        Ok(())
    }

    async fn get(&self) -> Result<Option<BrokerLink>> {
        Ok(self.link.read().await.clone())
    }
}

/// SQLite-backed store
///
/// The table admits a single row (`id = 1`), so the invariant holds in the schema too.
#[derive(Debug, Clone)]
pub struct SqliteBrokerStore {
    pool: SqlitePool,
}

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS brokers (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    broker_name TEXT NOT NULL,
    client_id TEXT NOT NULL,
    auth_token TEXT NOT NULL,
    connected_at TEXT NOT NULL
)";

const UPSERT: &str = "INSERT INTO brokers (id, broker_name, client_id, auth_token, connected_at)
VALUES (1, ?, ?, ?, ?)
ON CONFLICT(id) DO UPDATE SET
    broker_name = excluded.broker_name,
    client_id = excluded.client_id,
    auth_token = excluded.auth_token,
    connected_at = excluded.connected_at";

const SELECT: &str =
    "SELECT broker_name, client_id, auth_token, connected_at FROM brokers WHERE id = 1";

impl SqliteBrokerStore {
    /// Connect and create the database file and table if needed
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to `sqlite::memory:` is a separate database
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        sqlx::query(CREATE_TABLE).execute(&pool).await?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl BrokerStore for SqliteBrokerStore {
    async fn upsert(&self, link: BrokerLink) -> Result<()> {
        sqlx::query(UPSERT)
            .bind(&link.broker_name)
            .bind(&link.client_id)
            .bind(&link.auth_token)
            .bind(link.connected_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get(&self) -> Result<Option<BrokerLink>> {
        let row = sqlx::query(SELECT).fetch_optional(&self.pool).await?;

        row.map(|row| -> Result<BrokerLink> {
            Ok(BrokerLink {
                broker_name: row.try_get("broker_name")?,
                client_id: row.try_get("client_id")?,
                auth_token: row.try_get("auth_token")?,
                connected_at: row.try_get("connected_at")?,
            })
        })
        .transpose()
    }
}
