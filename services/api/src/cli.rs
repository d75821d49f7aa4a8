use crate::demo::{run_demo, run_underwrite, DemoArgs, UnderwriteArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use siteline::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Siteline Underwriter",
    about = "Run and demonstrate the self-storage site underwriting service",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Underwrite one site from the command line and print the decision
    Underwrite(UnderwriteArgs),
    /// Run a two-site CLI demo covering a clean run and a guardrail refusal
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
    /// Rent comp CSV export to hydrate the benchmark book
    #[arg(long)]
    pub(crate) rent_csv: Option<std::path::PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Underwrite(args) => run_underwrite(args),
        Command::Demo(args) => run_demo(args),
    }
}
