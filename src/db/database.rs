/**
 * Database Handle
 *
 * This module owns the shared PostgreSQL connection pool (and an optional
 * read replica) as an explicit resource on the application object, with an
 * explicit lifecycle policy instead of an ambient global.
 *
 * # Lifecycle
 *
 * - `Persistent`: connect once at process startup, disconnect once at
 *   shutdown. The pool is shared by every request handler; safe concurrent
 *   use is the pool's responsibility.
 * - `PerRequest`: connect before awaiting the service future, disconnect in
 *   a background task after the response is transmitted. No connection is
 *   shared across requests - repeated handshake cost traded for isolation.
 *
 * Connect failures are fatal for the request (or boot) they occur in and
 * are never swallowed.
 */

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::RwLock;

/// When the shared connection is opened and closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionLifecycle {
    /// Connect at startup, disconnect at shutdown.
    Persistent,
    /// Connect per request, disconnect after each response.
    PerRequest,
}

/// Invoked at connect time to bind ORM/model metadata to the fresh pools.
pub trait ModelInitializer: Send + Sync + 'static {
    fn initialize(&self, database: &PgPool, replica: Option<&PgPool>);
}

/// Shared database resource: primary pool, optional replica, optional
/// model initializer.
pub struct Database {
    url: String,
    replica_url: Option<String>,
    pool: RwLock<Option<PgPool>>,
    replica: RwLock<Option<PgPool>>,
    initializer: Option<Arc<dyn ModelInitializer>>,
}

impl Database {
    pub fn new(
        url: impl Into<String>,
        replica_url: Option<String>,
        initializer: Option<Arc<dyn ModelInitializer>>,
    ) -> Self {
        Self {
            url: url.into(),
            replica_url,
            pool: RwLock::new(None),
            replica: RwLock::new(None),
            initializer,
        }
    }

    /// Open the primary (and replica) pools if not already open, then run
    /// the model initializer.
    ///
    /// Returns whether a new primary connection was made. Idempotent: a
    /// second call on a connected handle is a no-op apart from the
    /// initializer.
    pub async fn connect(&self) -> Result<bool, sqlx::Error> {
        let mut started = false;
        {
            let mut pool = self.pool.write().await;
            if pool.is_none() {
                tracing::info!("Connecting to database");
                *pool = Some(PgPool::connect(&self.url).await?);
                started = true;
            }
        }
        if let Some(replica_url) = &self.replica_url {
            let mut replica = self.replica.write().await;
            if replica.is_none() {
                tracing::info!("Connecting to replica database");
                *replica = Some(PgPool::connect(replica_url).await?);
            }
        }
        if let Some(initializer) = &self.initializer {
            let pool = self.pool.read().await;
            let replica = self.replica.read().await;
            if let Some(pool) = pool.as_ref() {
                initializer.initialize(pool, replica.as_ref());
            }
        }
        Ok(started)
    }

    /// Close any open pools. Idempotent.
    pub async fn disconnect(&self) {
        if let Some(pool) = self.pool.write().await.take() {
            tracing::info!("Disconnecting from database");
            pool.close().await;
        }
        if let Some(replica) = self.replica.write().await.take() {
            replica.close().await;
        }
    }

    /// Whether the primary pool is currently open.
    pub async fn is_connected(&self) -> bool {
        self.pool.read().await.is_some()
    }

    /// Clone of the primary pool, if connected.
    pub async fn pool(&self) -> Option<PgPool> {
        self.pool.read().await.clone()
    }

    /// Clone of the replica pool if one is configured and connected, else
    /// the primary.
    pub async fn read_pool(&self) -> Option<PgPool> {
        match self.replica.read().await.clone() {
            Some(replica) => Some(replica),
            None => self.pool.read().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_database_is_not_connected() {
        let db = Database::new("postgres://localhost/app", None, None);
        assert!(!db.is_connected().await);
        assert!(db.pool().await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_without_connect_is_a_noop() {
        let db = Database::new("postgres://localhost/app", None, None);
        db.disconnect().await;
        assert!(!db.is_connected().await);
    }
}
