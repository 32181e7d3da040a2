//! # glossa-db
//!
//! Note and user stores for the glossa pipeline.
//!
//! - PostgreSQL repositories for notes (with their tags) and users
//! - In-memory repositories with the same semantics, for tests
//! - Embedded schema migrations (feature `migrations`)
//!
//! ```rust,ignore
//! use glossa_db::{Database, NoteRepository};
//!
//! let db = Database::connect("postgres://localhost/glossa").await?;
//! db.migrate().await?;
//! let notes = db.notes.list_by_user(user_id).await?;
//! ```
pub mod memory;
pub mod notes;
pub mod pool;
pub mod users;

pub mod test_fixtures;

// Re-export core types
pub use glossa_core::*;

pub use memory::{InMemoryNoteRepository, InMemoryUserRepository};
pub use notes::PgNoteRepository;
pub use pool::{create_pool, PoolConfig};
pub use users::PgUserRepository;

/// Pool plus the repositories built on it.
#[derive(Clone)]
pub struct Database {
    pub pool: sqlx::PgPool,
    pub notes: PgNoteRepository,
    pub users: PgUserRepository,
}

impl Database {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            notes: PgNoteRepository::new(pool.clone()),
            users: PgUserRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect using [`PoolConfig::from_env`].
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_config(url, &PoolConfig::from_env()).await
    }

    pub async fn connect_with_config(url: &str, config: &PoolConfig) -> Result<Self> {
        Ok(Self::new(create_pool(url, config).await?))
    }

    /// Apply the embedded schema migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}
