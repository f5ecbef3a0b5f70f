use clap::{Parser, Subcommand};
use grpc_auth::proto::auth_service_client::AuthServiceClient;
use grpc_auth::proto::{LoginRequest, RegisterRequest};
use tonic::Request;

#[derive(Parser)]
#[command(name = "auth-client")]
#[command(about = "Command-line client for the gRPC authentication server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://127.0.0.1:50051")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Register {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        password: String,

        #[arg(short, long)]
        first_name: String,

        #[arg(short, long)]
        last_name: String,
    },

    Login {
        /// Email address or username
        #[arg(short, long)]
        login: String,

        #[arg(short, long)]
        password: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut client = AuthServiceClient::connect(cli.server.clone()).await?;

    let outcome = match cli.command {
        Commands::Register {
            email,
            username,
            password,
            first_name,
            last_name,
        } => client
            .register(Request::new(RegisterRequest {
                email,
                username,
                password,
                first_name,
                last_name,
            }))
            .await
            .map(|resp| format!("Registered '{}'", resp.into_inner().message)),
        Commands::Login { login, password } => client
            .login(Request::new(LoginRequest {
                email: login,
                password,
            }))
            .await
            .map(|resp| format!("Token: {}", resp.into_inner().token)),
    };

    match outcome {
        Ok(line) => {
            println!("{line}");
            Ok(())
        }
        Err(status) => {
            eprintln!("{:?}: {}", status.code(), status.message());
            std::process::exit(1);
        }
    }
}
