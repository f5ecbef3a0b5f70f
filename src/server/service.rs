use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::{info, instrument, warn};

use crate::error::{AuthError, RepositoryError};
use crate::password::PasswordHasher;
use crate::persistence::{NewUser, UserRepository};
use crate::proto::auth_service_server::AuthService;
use crate::proto::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};
use crate::token::TokenIssuer;
use crate::validation::{LoginInput, RegisterInput};

/// gRPC service implementing `Register` and `Login`.
///
/// Holds no per-request state; every collaborator is shared and safe to use
/// from concurrent calls.
#[derive(Clone)]
pub struct AuthServiceImpl {
    repo: Arc<dyn UserRepository>,
    hasher: PasswordHasher,
    tokens: TokenIssuer,
}

impl AuthServiceImpl {
    /// Creates the service over the given repository.
    pub fn new(repo: Arc<dyn UserRepository>, hasher: PasswordHasher, tokens: TokenIssuer) -> Self {
        Self {
            repo,
            hasher,
            tokens,
        }
    }

    /// Validates, checks uniqueness, hashes and stores a new user.
    ///
    /// Returns the stored username.
    pub async fn register_user(&self, req: &RegisterRequest) -> Result<String, AuthError> {
        RegisterInput {
            email: &req.email,
            username: &req.username,
            password: &req.password,
            first_name: &req.first_name,
            last_name: &req.last_name,
        }
        .validate()?;

        if self
            .repo
            .check_user_exists(&req.username, &req.email)
            .await?
        {
            info!(username = %req.username, email = %req.email, "user already exists");
            return Err(AuthError::AlreadyExists);
        }

        let password_hash = self.hasher.hash(&req.password).await?;

        let username = self
            .repo
            .register_user(&NewUser {
                email: req.email.clone(),
                username: req.username.clone(),
                password_hash,
                first_name: req.first_name.clone(),
                last_name: req.last_name.clone(),
            })
            .await
            .inspect_err(|e| {
                if matches!(e, RepositoryError::UniqueViolation) {
                    info!(username = %req.username, "lost registration race to a concurrent insert");
                }
            })?;

        info!(username = %username, "user registered");
        Ok(username)
    }

    /// Validates, looks the user up and checks the password.
    ///
    /// Returns a bearer token.
    pub async fn login_user(&self, req: &LoginRequest) -> Result<String, AuthError> {
        LoginInput {
            login: &req.email,
            password: &req.password,
        }
        .validate()?;

        info!(login = %req.email, "login attempt");

        let user = self.repo.get_user_by_login(&req.email).await?;

        if !self.hasher.verify(&req.password, &user.password_hash).await? {
            warn!(login = %req.email, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        info!(username = %user.username, "user logged in");
        Ok(self.tokens.issue(&user.username))
    }
}

#[tonic::async_trait]
impl AuthService for AuthServiceImpl {
    #[instrument(skip_all, name = "register")]
    async fn register(
        &self,
        request: Request<RegisterRequest>,
    ) -> Result<Response<RegisterResponse>, Status> {
        let req = request.into_inner();
        let message = self.register_user(&req).await?;
        Ok(Response::new(RegisterResponse { message }))
    }

    #[instrument(skip_all, name = "login")]
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<LoginResponse>, Status> {
        let req = request.into_inner();
        let token = self.login_user(&req).await?;
        Ok(Response::new(LoginResponse { token }))
    }
}
