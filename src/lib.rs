//! gRPC authentication service.
//!
//! Exposes `Register` and `Login` over tonic, stores users in PostgreSQL with
//! bcrypt password hashes, and shuts down gracefully on SIGINT/SIGTERM.

pub mod config;
pub mod error;
pub mod logging;
pub mod password;
pub mod persistence;
pub mod server;
pub mod token;
pub mod validation;

/// Generated protobuf and gRPC types for the `auth` package.
pub mod proto {
    tonic::include_proto!("auth");
}

pub use config::{AuthConfig, PostgresConfig};
pub use error::{AuthError, Error, RepositoryError, Result};
pub use password::PasswordHasher;
pub use persistence::{MemoryUserRepository, NewUser, PgUserRepository, User, UserRepository};
pub use server::AuthServiceImpl;
pub use token::{TokenIssuer, TokenMode};
