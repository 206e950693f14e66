//! Full run: load from Postgres, submit over HTTP, write statuses back.
//!
//! Configure with `CXML_DATABASE_URL`, `CXML_ENDPOINT`, `CXML_SOURCE`,
//! `CXML_SIGNATURE_FILE` and friends, or pass a JSON config path.

use cxml_invoice::cxml::{SignatureMaterial, StaticSignature};
use cxml_invoice::pipeline::{InvoiceOutcome, Pipeline, PipelineConfig};
use cxml_invoice::store::PgStore;
use cxml_invoice::submit::SubmissionClient;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => PipelineConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PipelineConfig::from_env()?,
    };
    let material = match &config.signature_file {
        Some(path) => SignatureMaterial::from_file(path)?,
        None => SignatureMaterial::default(),
    };
    let signer = StaticSignature(material);
    let store = PgStore::new(&config)?;
    let client = SubmissionClient::new(&config.endpoint, config.timeout())?;

    let report = Pipeline::new(&config, &store, &store, &client, &signer).run()?;
    for r in &report.invoices {
        if let InvoiceOutcome::TransportFailed(e) = &r.outcome {
            error!(invoice_id = %r.invoice_id, endpoint = %e.endpoint, "retry manually");
        }
    }
    info!(
        sent = report.sent(),
        rejected = report.rejected(),
        failed = report.failed(),
        "done"
    );
    if report.failed() > 0 {
        std::process::exit(1);
    }
    Ok(())
}
