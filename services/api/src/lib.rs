mod cli;
mod demo;
mod infra;
mod jobs;
mod routes;
mod server;

use marriage_compliance::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
