use anyhow::Context;
use bc_submitter::Submitter;
use bp_boop::Boop;
use futures::future::join_all;
use std::path::{Path, PathBuf};

/// Reads a boop from a JSON file, using the camelCase field names of the entry point.
pub fn read_boop(path: &Path) -> anyhow::Result<Boop> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Reading boop file {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Parsing boop file {}", path.display()))
}

pub async fn simulate(submitter: &Submitter, paths: &[PathBuf]) -> anyhow::Result<()> {
    for path in paths {
        let boop = read_boop(path)?;
        let boop_hash = submitter.boop_hash(&boop);
        let output = submitter.simulate(&boop).await.with_context(|| format!("Simulating {}", path.display()))?;

        tracing::info!(
            file = %path.display(),
            %boop_hash,
            admissible = output.is_admissible(),
            "Simulation: {}",
            serde_json::to_string(&output)?
        );
        if output.is_admissible() {
            let mut filled = boop;
            filled.apply_gas_estimates(&output.gas, submitter.config().gas_safety_margin_percent);
            tracing::info!(
                %boop_hash,
                gas_limit = filled.gas_limit,
                validate_gas_limit = filled.validate_gas_limit,
                validate_payment_gas_limit = filled.validate_payment_gas_limit,
                execute_gas_limit = filled.execute_gas_limit,
                "Gas limits used on submission"
            );
        }
    }
    Ok(())
}

/// Submits every boop concurrently and returns how many could not be submitted.
pub async fn submit(submitter: &Submitter, paths: &[PathBuf]) -> anyhow::Result<usize> {
    let boops = paths.iter().map(|path| read_boop(path)).collect::<anyhow::Result<Vec<_>>>()?;
    let outcomes = join_all(boops.into_iter().map(|boop| submitter.submit(boop))).await;

    let mut failed = 0;
    for (path, outcome) in paths.iter().zip(outcomes) {
        match outcome {
            Ok(receipt) => {
                tracing::info!(file = %path.display(), boop_hash = %receipt.boop_hash, tx_hash = %receipt.tx_hash, "Sent")
            }
            Err(err) => {
                failed += 1;
                tracing::warn!(
                    file = %path.display(),
                    status = err.status(),
                    revert_data = ?err.revert_data(),
                    "Not sent: {err}"
                );
            }
        }
    }
    Ok(failed)
}
