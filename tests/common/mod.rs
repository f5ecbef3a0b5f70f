//! Common test utilities shared across integration tests.
#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use grpc_auth::persistence::UserRepository;
use grpc_auth::proto::auth_service_client::AuthServiceClient;
use grpc_auth::proto::RegisterRequest;
use grpc_auth::server::{self, AuthServiceImpl};
use grpc_auth::{PasswordHasher, TokenIssuer, TokenMode};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonic::transport::Channel;

/// Lowest cost bcrypt accepts; keeps tests fast.
pub const TEST_BCRYPT_COST: u32 = 4;

/// Initialize test tracing (call once at the beginning of tests).
///
/// Subsequent calls are safe and will be ignored.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new("grpc_auth=debug");

    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(filter)
        .try_init();
}

/// A running test server.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Option<oneshot::Sender<()>>,
    pub handle: JoinHandle<grpc_auth::Result<()>>,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub async fn client(&self) -> AuthServiceClient<Channel> {
        AuthServiceClient::connect(self.url())
            .await
            .expect("Failed to connect to server")
    }

    /// Triggers graceful shutdown and waits for the server to drain.
    pub async fn stop(mut self) -> grpc_auth::Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("server task panicked")
    }
}

pub async fn start_test_server(repo: Arc<dyn UserRepository>) -> TestServer {
    let service = AuthServiceImpl::new(
        repo,
        PasswordHasher::new(TEST_BCRYPT_COST),
        TokenIssuer::new(TokenMode::Placeholder),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    let handle = tokio::spawn(server::serve(listener, service, async move {
        let _ = rx.await;
    }));

    TestServer {
        addr,
        shutdown: Some(tx),
        handle,
    }
}

pub fn register_request(email: &str, username: &str, password: &str) -> RegisterRequest {
    RegisterRequest {
        email: email.to_string(),
        username: username.to_string(),
        password: password.to_string(),
        first_name: "Alice".to_string(),
        last_name: "Zed".to_string(),
    }
}

/// In-memory log sink for asserting on emitted records.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
