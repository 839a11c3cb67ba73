mod archive;
mod cli;
mod error;
mod kubernetes;
mod report;
mod types;
mod utils;

use clap::Parser;
use kube::{Client, config};
use std::io::{BufWriter, Write};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use archive::ZipReportWriter;
use cli::{Cli, Command};
use kubernetes::KubeClient;
use report::{stream_cluster_report, stream_operator_report};
use types::ClusterRef;
use utils::{default_report_file, report_root_dir};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let client = initialize_client(cli.context.clone()).await?;
    let client = KubeClient::new(client).with_timestamps(cli.timestamps);

    let namespace = cli.effective_namespace().to_string();
    let file = match (&cli.file, &cli.command) {
        (Some(file), _) => file.clone(),
        (None, Command::Cluster { name }) => {
            default_report_file("cluster", Some(name.as_str()), chrono::Utc::now())
        }
        (None, Command::Operator) => default_report_file("operator", None, chrono::Utc::now()),
    };
    let root_dir = report_root_dir(&file);

    let output = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&file)
        .map_err(|e| anyhow::anyhow!("Could not create report file '{}': {}", file, e))?;
    let mut zipper = ZipReportWriter::new(BufWriter::new(output));

    // Ctrl-C abandons the pod being streamed; the partial report is kept.
    let token = CancellationToken::new();
    let ctrl_c_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing the partial report");
            ctrl_c_token.cancel();
        }
    });

    let result = match &cli.command {
        Command::Cluster { name } => {
            let cluster = ClusterRef::new(name.clone(), namespace);
            info!(
                "Collecting logs of cluster {} in namespace {} into {}",
                cluster.name, cluster.namespace, file
            );
            stream_cluster_report(&client, &token, &cluster, &root_dir, &mut zipper).await
        }
        Command::Operator => {
            info!("Collecting operator logs in namespace {} into {}", namespace, file);
            stream_operator_report(&client, &token, &namespace, &root_dir, &mut zipper).await
        }
    };

    // The archive is finished even after a failure so that it stays readable.
    zipper
        .finish()
        .and_then(|mut out| out.flush())
        .map_err(|e| anyhow::anyhow!("Could not finish report file '{}': {}", file, e))?;

    match result {
        Ok(()) => {
            info!("Report written to {}", file);
            Ok(())
        }
        Err(e) => {
            if e.is_cancelled() {
                warn!("Partial report written to {}", file);
            }
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

async fn initialize_client(context: Option<String>) -> anyhow::Result<Client> {
    let client = match context {
        Some(ctx) => {
            let config = config::Config::from_kubeconfig(&config::KubeConfigOptions {
                context: Some(ctx.clone()),
                ..Default::default()
            })
            .await
            .map_err(|e| anyhow::anyhow!("Context '{}' not found in kubeconfig: {}", ctx, e))?;
            info!("Using context: {}", ctx);
            Client::try_from(config)?
        }
        None => {
            let config = config::Config::infer().await?;
            Client::try_from(config)?
        }
    };
    Ok(client)
}
