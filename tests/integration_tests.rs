mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::{register_request, start_test_server};
use grpc_auth::persistence::{MemoryUserRepository, NewUser, User, UserRepository};
use grpc_auth::proto::auth_service_client::AuthServiceClient;
use grpc_auth::proto::LoginRequest;
use grpc_auth::RepositoryError;
use tonic::{Code, Request};

fn login_request(email: &str, password: &str) -> LoginRequest {
    LoginRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn register_happy_path() {
    common::init_tracing();
    let repo = MemoryUserRepository::new();
    let server = start_test_server(Arc::new(repo.clone())).await;
    let mut client = server.client().await;

    let response = client
        .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
        .await
        .expect("Registration should succeed");

    assert_eq!(response.into_inner().message, "alice");
    assert_eq!(repo.user_count().await, 1);
}

#[tokio::test]
async fn register_duplicate_is_already_exists() {
    let repo = MemoryUserRepository::new();
    let server = start_test_server(Arc::new(repo.clone())).await;
    let mut client = server.client().await;

    client
        .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
        .await
        .expect("First registration should succeed");

    let status = client
        .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
        .await
        .expect_err("Duplicate registration should fail");

    assert_eq!(status.code(), Code::AlreadyExists);
    assert_eq!(repo.user_count().await, 1);
}

#[tokio::test]
async fn register_invalid_is_invalid_argument() {
    let repo = MemoryUserRepository::new();
    let server = start_test_server(Arc::new(repo.clone())).await;
    let mut client = server.client().await;

    let status = client
        .register(Request::new(register_request("a@b.c", "a", "p@ssw0rd")))
        .await
        .expect_err("Invalid username should be rejected");

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().contains("username"));
    assert_eq!(repo.user_count().await, 0);
}

#[tokio::test]
async fn login_happy_path() {
    let server = start_test_server(Arc::new(MemoryUserRepository::new())).await;
    let mut client = server.client().await;

    client
        .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
        .await
        .unwrap();

    let response = client
        .login(Request::new(login_request("alice", "p@ssw0rd")))
        .await
        .expect("Login should succeed");

    assert_eq!(response.into_inner().token, "JWT_TOKEN");
}

#[tokio::test]
async fn login_wrong_password_is_unauthenticated() {
    let server = start_test_server(Arc::new(MemoryUserRepository::new())).await;
    let mut client = server.client().await;

    client
        .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
        .await
        .unwrap();

    let status = client
        .login(Request::new(login_request("alice", "wrong!")))
        .await
        .expect_err("Wrong password should fail");

    assert_eq!(status.code(), Code::Unauthenticated);
}

#[tokio::test]
async fn login_unknown_user_is_not_found() {
    let server = start_test_server(Arc::new(MemoryUserRepository::new())).await;
    let mut client = server.client().await;

    let status = client
        .login(Request::new(login_request("ghost", "whatever")))
        .await
        .expect_err("Unknown user should fail");

    assert_eq!(status.code(), Code::NotFound);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registrations_have_exactly_one_winner() {
    let repo = MemoryUserRepository::new();
    let server = start_test_server(Arc::new(repo.clone())).await;
    let url = server.url();

    let mut handles = Vec::new();
    for i in 0..12 {
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let mut client = AuthServiceClient::connect(url).await.unwrap();
            client
                .register(Request::new(register_request(
                    &format!("user{i}@b.c"),
                    "contested",
                    "p@ssw0rd",
                )))
                .await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => ok += 1,
            Err(status) => assert_eq!(status.code(), Code::AlreadyExists),
        }
    }

    assert_eq!(ok, 1);
    assert_eq!(repo.user_count().await, 1);
}

/// Repository that always fails as if the database were unreachable.
struct BrokenRepository;

#[async_trait]
impl UserRepository for BrokenRepository {
    async fn register_user(&self, _user: &NewUser) -> Result<String, RepositoryError> {
        Err(RepositoryError::Backend {
            context: "unable to create user",
            source: sqlx::Error::PoolTimedOut,
        })
    }

    async fn check_user_exists(&self, _: &str, _: &str) -> Result<bool, RepositoryError> {
        Err(RepositoryError::Backend {
            context: "unable to check user",
            source: sqlx::Error::PoolTimedOut,
        })
    }

    async fn get_user_by_username(&self, _: &str) -> Result<User, RepositoryError> {
        Err(RepositoryError::Backend {
            context: "unable to get user by username",
            source: sqlx::Error::PoolTimedOut,
        })
    }

    async fn get_user_by_login(&self, _: &str) -> Result<User, RepositoryError> {
        Err(RepositoryError::Backend {
            context: "unable to get user by login",
            source: sqlx::Error::PoolTimedOut,
        })
    }

    async fn close(&self) {}
}

#[tokio::test]
async fn backend_failures_are_internal_without_detail() {
    let server = start_test_server(Arc::new(BrokenRepository)).await;
    let mut client = server.client().await;

    let status = client
        .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
    assert!(!status.message().contains("pool"));

    let status = client
        .login(Request::new(login_request("alice", "p@ssw0rd")))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);
}

/// Delays inserts so a call can be caught in flight.
struct SlowRepository {
    inner: MemoryUserRepository,
    delay: Duration,
}

#[async_trait]
impl UserRepository for SlowRepository {
    async fn register_user(&self, user: &NewUser) -> Result<String, RepositoryError> {
        tokio::time::sleep(self.delay).await;
        self.inner.register_user(user).await
    }

    async fn check_user_exists(&self, username: &str, email: &str) -> Result<bool, RepositoryError> {
        self.inner.check_user_exists(username, email).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<User, RepositoryError> {
        self.inner.get_user_by_username(username).await
    }

    async fn get_user_by_login(&self, login: &str) -> Result<User, RepositoryError> {
        self.inner.get_user_by_login(login).await
    }

    async fn close(&self) {}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn graceful_shutdown_drains_in_flight_calls() {
    let inner = MemoryUserRepository::new();
    let repo = SlowRepository {
        inner: inner.clone(),
        delay: Duration::from_millis(500),
    };
    let server = start_test_server(Arc::new(repo)).await;
    let url = server.url();
    let mut client = server.client().await;

    let in_flight = tokio::spawn(async move {
        client
            .register(Request::new(register_request("a@b.c", "alice", "p@ssw0rd")))
            .await
    });

    tokio::time::sleep(Duration::from_millis(150)).await;
    server.stop().await.expect("Server should shut down cleanly");

    let response = in_flight
        .await
        .unwrap()
        .expect("In-flight call should complete");
    assert_eq!(response.into_inner().message, "alice");
    assert_eq!(inner.user_count().await, 1);

    assert!(
        AuthServiceClient::connect(url).await.is_err(),
        "No new connections after shutdown"
    );
}

#[tokio::test]
async fn expired_deadline_abandons_register() {
    common::init_tracing();
    let inner = MemoryUserRepository::new();
    let repo = SlowRepository {
        inner: inner.clone(),
        delay: Duration::from_millis(500),
    };
    let server = start_test_server(Arc::new(repo)).await;
    let mut client = server.client().await;

    let mut request = Request::new(register_request("a@b.c", "alice", "p@ssw0rd"));
    request.set_timeout(Duration::from_millis(100));
    let status = client
        .register(request)
        .await
        .expect_err("Register should not outlive its deadline");
    assert!(
        matches!(status.code(), Code::DeadlineExceeded | Code::Cancelled),
        "unexpected code {:?}",
        status.code()
    );

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(inner.user_count().await, 0, "Abandoned write must not land");

    server.stop().await.expect("Server should shut down cleanly");
}
