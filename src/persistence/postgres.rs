use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::{Connection, PgPool};
use tracing::info;

use super::{NewUser, User, UserRepository};
use crate::config::PostgresConfig;
use crate::error::RepositoryError;

const CREATE_USER_QUERY: &str = r#"
    INSERT INTO users (email, username, password_hash, first_name, last_name)
    VALUES ($1, $2, $3, $4, $5)
    RETURNING username
"#;

const CHECK_USER_EXISTS_QUERY: &str = r#"
    SELECT EXISTS (SELECT 1 FROM users WHERE username = $1 OR email = $2)
"#;

const GET_USER_BY_USERNAME_QUERY: &str = r#"
    SELECT email, username, password_hash, first_name, last_name
    FROM users
    WHERE username = $1
"#;

const GET_USER_BY_LOGIN_QUERY: &str = r#"
    SELECT email, username, password_hash, first_name, last_name
    FROM users
    WHERE username = $1 OR email = $1
    ORDER BY (username = $1) DESC
    LIMIT 1
"#;

/// Prepared statements kept per connection.
const STATEMENT_CACHE_CAPACITY: usize = 100;

/// [`UserRepository`] over a PostgreSQL connection pool.
#[derive(Clone, Debug)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Builds the pool from configuration and pings the database.
    ///
    /// Fails fast if the server cannot be reached, so a misconfigured process
    /// never starts serving.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.pool_max_conns)
            .max_lifetime(config.pool_max_conn_lifetime)
            .idle_timeout(config.pool_max_conn_idle_time)
            .connect_lazy_with(connect_options(config)?);

        let repo = Self { pool };
        repo.ping().await?;

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            max_conns = config.pool_max_conns,
            "connected to PostgreSQL"
        );

        Ok(repo)
    }

    /// Wraps an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Round-trips a ping over a pooled connection.
    pub async fn ping(&self) -> Result<(), RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(RepositoryError::backend("failed to connect to database"))?;
        conn.ping()
            .await
            .map_err(RepositoryError::backend("database ping failed"))
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions, RepositoryError> {
    let ssl_mode = PgSslMode::from_str(&config.sslmode).map_err(RepositoryError::backend(
        "failed to parse PostgreSQL config",
    ))?;

    Ok(PgConnectOptions::new()
        .username(&config.user)
        .password(&config.password)
        .host(&config.host)
        .port(config.port)
        .database(&config.name)
        .ssl_mode(ssl_mode)
        .statement_cache_capacity(STATEMENT_CACHE_CAPACITY))
}

fn map_insert_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::UniqueViolation,
        _ => RepositoryError::Backend {
            context: "unable to create user",
            source: err,
        },
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn register_user(&self, user: &NewUser) -> Result<String, RepositoryError> {
        sqlx::query_scalar::<_, String>(CREATE_USER_QUERY)
            .bind(&user.email)
            .bind(&user.username)
            .bind(&user.password_hash)
            .bind(&user.first_name)
            .bind(&user.last_name)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)
    }

    async fn check_user_exists(
        &self,
        username: &str,
        email: &str,
    ) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(CHECK_USER_EXISTS_QUERY)
            .bind(username)
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(RepositoryError::backend("unable to check user"))
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(GET_USER_BY_USERNAME_QUERY)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::backend("unable to get user by username"))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn get_user_by_login(&self, login: &str) -> Result<User, RepositoryError> {
        sqlx::query_as::<_, User>(GET_USER_BY_LOGIN_QUERY)
            .bind(login)
            .fetch_optional(&self.pool)
            .await
            .map_err(RepositoryError::backend("unable to get user by login"))?
            .ok_or(RepositoryError::NotFound)
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("PostgreSQL pool closed");
    }
}
