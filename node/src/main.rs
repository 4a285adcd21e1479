//! Boop submitter command line.

mod cli;
mod commands;

use anyhow::{bail, Context};
use bc_analytics::Analytics;
use bc_chain::eth::EthereumChainGateway;
use bc_chain::{EthereumReceiptTracker, NoopReceiptTracker, ReceiptTracker};
use bc_submitter::Submitter;
use bp_utils::wait_or_graceful_shutdown;
use clap::Parser;
use cli::{Command, RunCmd};
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli_args = RunCmd::parse();

    // Command line arguments first, then the config file on top.
    let mut config = Figment::new().merge(Serialized::defaults(&cli_args));
    if let Some(config_path) = cli_args.config_file.clone() {
        config = match config_path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => config.merge(Toml::file(config_path)),
            Some("json") => config.merge(Json::file(config_path)),
            Some("yaml") | Some("yml") => config.merge(Yaml::file(config_path)),
            _ => bail!("Unsupported file type for config file."),
        };
    }
    let run_cmd: RunCmd = config.extract().context("Loading the configuration")?;

    let mut analytics = Analytics::new(run_cmd.analytics_params.as_analytics_config());
    analytics.setup().context("Setting up analytics")?;

    let gateway = EthereumChainGateway::new(&run_cmd.chain_params.as_gateway_config())
        .context("Connecting to the chain")?;
    let executors = gateway.executors().to_vec();
    if executors.is_empty() && matches!(run_cmd.command, Command::Submit { .. }) {
        tracing::warn!("No executor key configured, boops will not be sent");
    }

    let receipt_tracker = (!run_cmd.chain_params.no_receipt_tracking).then(|| {
        Arc::new(EthereumReceiptTracker::new(gateway.provider().clone(), run_cmd.chain_params.as_receipt_config()))
    });
    let receipts: Arc<dyn ReceiptTracker> = match &receipt_tracker {
        Some(tracker) => tracker.clone(),
        None => Arc::new(NoopReceiptTracker),
    };

    tracing::info!(
        chain_id = run_cmd.chain_params.chain_id,
        entry_point = %run_cmd.chain_params.entry_point,
        executors = executors.len(),
        "Boop submitter starting"
    );
    let submitter = Submitter::new(run_cmd.submitter_config(), Arc::new(gateway), receipts, executors);

    let outcome = match &run_cmd.command {
        Command::Simulate { boops } => wait_or_graceful_shutdown(commands::simulate(&submitter, boops)).await,
        Command::Submit { boops } => {
            wait_or_graceful_shutdown(async {
                let failed = commands::submit(&submitter, boops).await?;
                if let Some(tracker) = &receipt_tracker {
                    tracing::info!(in_flight = tracker.in_flight(), "Waiting for receipts");
                    tracker.wait().await;
                }
                anyhow::ensure!(failed == 0, "{failed} of {} boops were not sent", boops.len());
                Ok(())
            })
            .await
        }
    };

    if outcome.is_none() {
        tracing::info!("Interrupted, shutting down");
    }
    analytics.shutdown().context("Shutting down analytics")?;
    outcome.unwrap_or(Ok(()))
}
