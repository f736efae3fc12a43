mod args;

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use sql_handles::prelude::*;
use tracing::error;
use tracing_subscriber::EnvFilter;

use args::{Args, Mode};

async fn run(args: &Args) -> Result<serde_json::Value, SqlHandlesError> {
    let cfg = args.config()?;
    let service = SqlService::open(cfg, args.driver.driver()).await?;
    let outcome = execute(&service, args).await;
    service.close().await;
    outcome
}

async fn execute(service: &SqlService, args: &Args) -> Result<serde_json::Value, SqlHandlesError> {
    for statement in &args.setup {
        service.affected_rows(statement, &[]).await?;
    }
    let scope = service.caller(args.caller.as_deref().unwrap_or("sqlh"));
    let query_args = args.query_args();
    Ok(match args.mode {
        Mode::Rows => json_value(&scope.rows(&args.query, &query_args).await?)?,
        Mode::Row => json_value(&scope.row(&args.query, &query_args).await?)?,
        Mode::InsertId => json_value(&scope.insert_id(&args.query, &query_args).await?)?,
        Mode::Affected => json_value(&scope.affected_rows(&args.query, &query_args).await?)?,
        Mode::Exec => {
            scope.exec(&args.query, &query_args).await?;
            serde_json::Value::Null
        }
    })
}

fn json_value<T: Serialize>(value: &T) -> Result<serde_json::Value, SqlHandlesError> {
    serde_json::to_value(value).map_err(|e| SqlHandlesError::Other(format!("json encoding: {e}")))
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match run(&args).await {
        Ok(value) => {
            println!(
                "{}",
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "query failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
