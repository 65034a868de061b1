//! Structured run report for downstream tool consumption.

use std::path::Path;

use serde::Serialize;

use crate::conversion::{ConversionConfig, ConversionMode, ConversionSummary};

/// Complete report of a conversion run, serialized to JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Tool version
    pub version: String,
    /// Timestamp of run (RFC 3339)
    pub timestamp: String,
    pub mode: String,
    pub input: String,
    pub outputs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    pub statistics: ConversionSummary,
}

impl RunReport {
    pub fn new(config: &ConversionConfig, summary: &ConversionSummary) -> Self {
        let timestamp = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string());

        let (outputs, reference) = match &config.mode {
            ConversionMode::GenSample(mode) => {
                let outputs = match crate::output::OutputTargets::resolve(&mode.output) {
                    Ok(targets) => vec![
                        targets.genotype_path.display().to_string(),
                        targets.sample_path.display().to_string(),
                    ],
                    Err(_) => vec![mode.output.clone()],
                };
                (outputs, None)
            }
            ConversionMode::TsvToVcf(mode) => (
                vec![mode.output.display().to_string()],
                Some(mode.reference.display().to_string()),
            ),
        };

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp,
            mode: config.mode.name().to_string(),
            input: config.input.display().to_string(),
            outputs,
            reference,
            statistics: *summary,
        }
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)?;
        tracing::info!("Wrote run report to {}", path.display());
        Ok(())
    }
}
