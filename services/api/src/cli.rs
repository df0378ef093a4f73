use crate::demo::{run_demo, DemoArgs};
use crate::jobs::{run_dashboard, run_dispatch, run_sweep, BatchArgs, DashboardArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use marriage_compliance::error::AppError;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "Marriage Compliance",
    about = "Track legal marriage form deadlines, reminders and compliance alerts",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service with scheduled sweeps and reminders (default command)
    Serve(ServeArgs),
    /// Run one compliance sweep and print the summary
    Sweep(BatchArgs),
    /// Run one reminder dispatch through the log transport and print the summary
    Dispatch(BatchArgs),
    /// Print organization dashboards, or per-form status as CSV
    Dashboard(DashboardArgs),
    /// Walk a set of demo couples through a simulated fortnight
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
    /// JSON couple directory export to load at startup
    #[arg(long)]
    pub(crate) couples: Option<PathBuf>,
    /// Load the built-in demo couples when no directory export is given
    #[arg(long)]
    pub(crate) seed_demo: bool,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Sweep(args) => run_sweep(args),
        Command::Dispatch(args) => run_dispatch(args).await,
        Command::Dashboard(args) => run_dashboard(args),
        Command::Demo(args) => run_demo(args).await,
    }
}
