use crate::demo::{run_demo, DemoArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use parkqueue::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "ParkQueue Admin",
    about = "Run the ParkQueue admin API, its email service, or a local approval demo",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the admin HTTP API (default command)
    Serve(ServeArgs),
    /// Start the email microservice that delivers status notifications
    Mailer(ServeArgs),
    /// Walk a seeded directory through load, review, and export
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run_admin(args).await,
        Command::Mailer(args) => server::run_mailer(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
