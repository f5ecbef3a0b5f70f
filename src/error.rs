//! Error types for the authentication service.

use tonic::Status;
use tracing::{debug, error};

use crate::validation::ValidationErrors;

/// Convenience alias for startup and wiring results.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal errors raised while starting or running the server process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be loaded or is invalid.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The log subscriber could not be installed.
    #[error("Failed to initialise logger: {0}")]
    Logger(String),

    /// The connection pool could not be built or the database did not answer the ping.
    #[error("Failed to initialise repository: {0}")]
    Repository(#[from] RepositoryError),

    /// Schema migrations failed to apply.
    #[error("Failed to run migrations: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    /// The listen socket could not be bound.
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested.
        addr: std::net::SocketAddr,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The gRPC transport stopped with an error.
    #[error("Server error: {0}")]
    Serve(#[from] tonic::transport::Error),
}

/// Errors reported by a [`UserRepository`](crate::persistence::UserRepository).
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The email or username is already taken.
    #[error("user already exists")]
    UniqueViolation,

    /// No row matched the lookup key.
    #[error("user not found")]
    NotFound,

    /// Transport, pool or SQL failure.
    #[error("{context}: {source}")]
    Backend {
        /// Short description of the operation that failed.
        context: &'static str,
        /// Underlying driver error.
        #[source]
        source: sqlx::Error,
    },
}

impl RepositoryError {
    pub(crate) fn backend(context: &'static str) -> impl FnOnce(sqlx::Error) -> Self {
        move |source| Self::Backend { context, source }
    }
}

/// Request-level failures of the auth service.
///
/// Every variant maps to exactly one gRPC status code through
/// `From<AuthError> for Status`; the message sent to the caller never contains
/// backend detail, passwords or hashes.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// One or more request fields violated their constraints.
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationErrors),

    /// Username or email is already registered.
    #[error("user already exists")]
    AlreadyExists,

    /// No account matches the login identifier.
    #[error("user not found")]
    NotFound,

    /// The password does not match the stored hash.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// bcrypt failed to hash or to parse a stored hash. The reason is a
    /// fixed phrase and never contains the password or the hash.
    #[error("password hashing failed: {0}")]
    Hashing(&'static str),

    /// The persistence layer failed.
    #[error("repository failure: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for AuthError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::UniqueViolation => Self::AlreadyExists,
            RepositoryError::NotFound => Self::NotFound,
            backend @ RepositoryError::Backend { .. } => Self::Repository(backend),
        }
    }
}

impl From<AuthError> for Status {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(errors) => {
                debug!(fields = %errors.field_names().join(","), "request failed validation");
                Status::invalid_argument(format!("invalid input: {}", errors.field_names().join(", ")))
            }
            AuthError::AlreadyExists => Status::already_exists("user already exists"),
            AuthError::NotFound => Status::not_found("user not found"),
            AuthError::InvalidCredentials => Status::unauthenticated("invalid credentials"),
            AuthError::Hashing(reason) => {
                error!(error = %reason, "password hashing failed");
                Status::internal("internal error")
            }
            AuthError::Repository(source) => {
                error!(error = %source, "repository failure");
                Status::internal("internal error")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use tonic::Code;

    use super::*;
    use crate::validation::{Field, Rule, Validator};

    #[test]
    fn repository_errors_map_to_domain_errors() {
        assert!(matches!(
            AuthError::from(RepositoryError::UniqueViolation),
            AuthError::AlreadyExists
        ));
        assert!(matches!(
            AuthError::from(RepositoryError::NotFound),
            AuthError::NotFound
        ));
        let backend = RepositoryError::Backend {
            context: "unable to check user",
            source: sqlx::Error::PoolTimedOut,
        };
        assert!(matches!(AuthError::from(backend), AuthError::Repository(_)));
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let errors = Validator::check(&[Field::new("username", "a", &[Rule::Min(3)])]).unwrap_err();
        assert_eq!(Status::from(AuthError::Validation(errors)).code(), Code::InvalidArgument);
        assert_eq!(Status::from(AuthError::AlreadyExists).code(), Code::AlreadyExists);
        assert_eq!(Status::from(AuthError::NotFound).code(), Code::NotFound);
        assert_eq!(
            Status::from(AuthError::InvalidCredentials).code(),
            Code::Unauthenticated
        );
        assert_eq!(
            Status::from(AuthError::Hashing("bcrypt cost not allowed")).code(),
            Code::Internal
        );
    }

    #[test]
    fn backend_detail_is_not_sent_to_caller() {
        let err = AuthError::Repository(RepositoryError::Backend {
            context: "unable to create user",
            source: sqlx::Error::Protocol("relation \"users\" does not exist".to_string()),
        });
        let status = Status::from(err);
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "internal error");
    }
}
