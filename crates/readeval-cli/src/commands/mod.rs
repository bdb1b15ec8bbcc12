pub mod batch;
pub mod decode;
pub mod evaluate;
pub mod fluency;
pub mod init;
pub mod validate;

use std::sync::Arc;

use anyhow::{Context, Result};

use readeval_core::engine::EvaluationEngine;
use readeval_core::traits::SpeechEvaluator;
use readeval_ise::config::{create_client, create_engine, ReadevalConfig};
use readeval_ise::MockEvaluator;

/// Engine over the remote client, or over the mock when `mock` is set.
pub(crate) fn build_engine(config: &ReadevalConfig, mock: bool) -> Result<EvaluationEngine> {
    let evaluator: Arc<dyn SpeechEvaluator> = if mock {
        Arc::new(MockEvaluator::default())
    } else {
        Arc::new(
            create_client(config)
                .context("configure [engine] in readeval.toml or pass --mock for an offline run")?,
        )
    };
    tracing::debug!(evaluator = evaluator.name(), "evaluator ready");
    Ok(create_engine(config, evaluator))
}

pub(crate) fn timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H%M%S").to_string()
}
