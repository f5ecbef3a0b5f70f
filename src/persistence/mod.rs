//! User storage.
//!
//! [`UserRepository`] is the contract the auth service depends on.
//! [`PgUserRepository`] backs it with a PostgreSQL pool; [`MemoryUserRepository`]
//! keeps users in process for tests and local development.

use std::fmt;

use async_trait::async_trait;

use crate::error::RepositoryError;

/// In-process repository.
pub mod memory;

/// PostgreSQL repository.
pub mod postgres;

pub use memory::MemoryUserRepository;
pub use postgres::PgUserRepository;

/// A stored user row.
#[derive(Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct User {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("email", &self.email)
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .finish()
    }
}

/// Values for a row about to be inserted. `password_hash` must already be hashed.
pub type NewUser = User;

/// Storage operations used by the auth service.
///
/// Implementations must be safe to call from many tasks at once. Dropping a
/// returned future abandons the operation and releases any connection it held.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts a user and returns the stored username.
    ///
    /// Fails with [`RepositoryError::UniqueViolation`] when the email or the
    /// username is already present.
    async fn register_user(&self, user: &NewUser) -> Result<String, RepositoryError>;

    /// Whether any row has this username or this email.
    async fn check_user_exists(&self, username: &str, email: &str)
        -> Result<bool, RepositoryError>;

    /// Looks a user up by the `username` column.
    async fn get_user_by_username(&self, username: &str) -> Result<User, RepositoryError>;

    /// Looks a user up by username or email, preferring a username match.
    async fn get_user_by_login(&self, login: &str) -> Result<User, RepositoryError>;

    /// Releases pooled resources. Later calls may fail.
    async fn close(&self);
}
