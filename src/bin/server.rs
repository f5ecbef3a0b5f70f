use std::sync::Arc;

use clap::Parser;
use grpc_auth::config::AuthConfig;
use grpc_auth::error::Error;
use grpc_auth::persistence::{MemoryUserRepository, PgUserRepository, UserRepository};
use grpc_auth::server::{self, AuthServiceImpl};
use grpc_auth::{logging, PasswordHasher, TokenIssuer};
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "auth-server")]
#[command(about = "gRPC authentication server", long_about = None)]
#[command(version)]
struct Args {
    /// Keep users in memory instead of PostgreSQL (development only)
    #[arg(long, env = "AUTH_IN_MEMORY", default_value = "false")]
    in_memory: bool,

    /// Apply bundled schema migrations before serving
    #[arg(long, env = "AUTH_MIGRATE", default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match AuthConfig::from_env().and_then(|c| c.validate().map(|()| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = logging::init(&config.log_level, &config.log_format) {
        eprintln!("{e}");
        std::process::exit(1);
    }

    if let Err(e) = run(args, config).await {
        logging::fatal(e);
    }
}

async fn run(args: Args, config: AuthConfig) -> Result<(), Error> {
    let repo: Arc<dyn UserRepository> = if args.in_memory {
        warn!("using in-memory user store; data is lost on exit");
        Arc::new(MemoryUserRepository::new())
    } else {
        let pg = PgUserRepository::connect(&config.postgresql).await?;
        if args.migrate {
            pg.migrate().await?;
            info!("migrations applied");
        }
        Arc::new(pg)
    };

    let service = AuthServiceImpl::new(
        Arc::clone(&repo),
        PasswordHasher::new(config.bcrypt_cost),
        TokenIssuer::new(config.token_mode),
    );

    let addr = config.listen_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| Error::Bind { addr, source })?;

    info!(
        addr = %listener.local_addr().unwrap_or(addr),
        token_mode = ?config.token_mode,
        bcrypt_cost = config.bcrypt_cost,
        "gRPC server started"
    );

    let served = server::serve(listener, service, server::shutdown_signal()).await;

    repo.close().await;

    served?;
    info!("server shutdown complete");
    Ok(())
}
