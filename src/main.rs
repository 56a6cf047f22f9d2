//! dune - run Dune queries from the command line.

mod cli;

use std::time::Duration;

use anyhow::Context;
use cli::{Cli, Command, QueryArgs};
use dune_client::error::DuneError;
use dune_client::execution::PollOptions;
use dune_client::logging;
use dune_client::types::{CsvResponse, ExecutionId, ExecutionParams, ResultsResponse};
use dune_client::DuneClient;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(path.as_deref()),
        None => logging::init_stderr_logging(),
    }

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<DuneError>() {
            Some(err) => error!("{}: {:#}", err.category(), e),
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.client_config()?;
    info!("Using Dune API at {}", config.base_url);
    let client = DuneClient::new(config)?;

    match cli.command {
        Command::Run {
            query,
            performance,
            ping,
            timeout,
        } => {
            let params = ExecutionParams {
                query_parameters: query.parameters()?,
                performance: performance.unwrap_or(client.config().performance),
            };
            let mut options = match ping {
                Some(secs) => PollOptions::every_secs(secs),
                None => client.poll_options(),
            };
            if let Some(secs) = timeout {
                options = options.with_deadline(Duration::from_secs(secs));
            }
            options = options.with_cancellation(ctrl_c_token());

            run_query(&client, &query, &params, &options).await
        }
        Command::Latest {
            query,
            max_age_hours,
        } => {
            let params = query.parameters()?;
            if query.csv {
                let csv = client
                    .get_latest_result_csv(query.query_id, params, max_age_hours)
                    .await?;
                print!("{csv}");
            } else {
                let results = client
                    .get_latest_result(query.query_id, params, max_age_hours)
                    .await?;
                print_json(&results)?;
            }
            Ok(())
        }
        Command::Status { execution_id } => {
            let status = client
                .get_execution_status(&ExecutionId::new(execution_id))
                .await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
        Command::Cancel { execution_id } => {
            let cancelled = client
                .cancel_execution(&ExecutionId::new(execution_id.clone()))
                .await?;
            if cancelled {
                println!("Cancelled {execution_id}");
            } else {
                println!("Execution {execution_id} was not cancelled");
            }
            Ok(())
        }
    }
}

async fn run_query(
    client: &DuneClient,
    query: &QueryArgs,
    params: &ExecutionParams,
    options: &PollOptions,
) -> anyhow::Result<()> {
    let outcome = if query.csv {
        client
            .run_query_with::<CsvResponse>(query.query_id, params, options)
            .await
            .map(|csv| print!("{}", csv.data))
    } else {
        match client
            .run_query_with::<ResultsResponse>(query.query_id, params, options)
            .await
        {
            Ok(results) => print_json(&results).map_err(|e| DuneError::malformed(e.to_string())),
            Err(e) => Err(e),
        }
    };

    // Interrupted or timed-out runs would otherwise keep executing remotely.
    if let Err(DuneError::Aborted { execution_id, .. } | DuneError::PollTimeout { execution_id, .. }) =
        &outcome
    {
        warn!(execution_id = %execution_id, "stopping remote execution");
        if let Err(e) = client.cancel_execution(execution_id).await {
            warn!("Failed to cancel execution {}: {}", execution_id, e);
        }
    }

    outcome.with_context(|| format!("running query {}", query.query_id))
}

fn print_json(results: &ResultsResponse) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(results)?);
    Ok(())
}

/// Returns a token that is cancelled on Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let on_signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });
    token
}
