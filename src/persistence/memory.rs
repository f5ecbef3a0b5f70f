use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{NewUser, User, UserRepository};
use crate::error::RepositoryError;

#[derive(Default)]
struct Tables {
    users: HashMap<String, User>,
    emails: HashMap<String, String>,
}

/// Thread-safe in-memory user store.
///
/// Holds the same uniqueness guarantees as the `users` table: an insert takes
/// the write lock, checks both keys and stores the row in one step. Clones
/// share the same store.
#[derive(Clone, Default)]
pub struct MemoryUserRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryUserRepository {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepository {
    async fn register_user(&self, user: &NewUser) -> Result<String, RepositoryError> {
        let mut tables = self.tables.write().await;

        if tables.users.contains_key(&user.username) || tables.emails.contains_key(&user.email) {
            return Err(RepositoryError::UniqueViolation);
        }

        tables
            .emails
            .insert(user.email.clone(), user.username.clone());
        tables.users.insert(user.username.clone(), user.clone());

        Ok(user.username.clone())
    }

    async fn check_user_exists(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, RepositoryError> {
        let tables = self.tables.read().await;
        Ok(tables.users.contains_key(username) || tables.emails.contains_key(email))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        let tables = self.tables.read().await;
        tables
            .users
            .get(username)
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_user_by_login(&self, login: &str) -> Result<User, RepositoryError> {
        let tables = self.tables.read().await;
        if let Some(user) = tables.users.get(login) {
            return Ok(user.clone());
        }
        tables
            .emails
            .get(login)
            .and_then(|username| tables.users.get(username))
            .cloned()
            .ok_or(RepositoryError::NotFound)
    }

    async fn close(&self) {}
}
