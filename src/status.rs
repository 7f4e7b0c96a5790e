use serde::Serialize;

use crate::error::CheckError;
use crate::guard::Outcome;

/// Machine-readable summary of one check, printed by `singleton check --json`.
#[derive(Debug, Serialize)]
pub struct StatusRecord {
    pub outcome: Option<Outcome>,
    pub error: Option<&'static str>,
    pub os_code: Option<u32>,
    pub owns_namespace: bool,
    pub report: Vec<String>,
    pub pid: u32,
    pub checked_at: String,
}

impl StatusRecord {
    pub fn new(
        status: &Result<Outcome, CheckError>,
        owns_namespace: bool,
        report: Vec<String>,
    ) -> Self {
        let (outcome, error, os_code) = match status {
            Ok(outcome) => (Some(*outcome), None, None),
            Err(e) => (None, Some(e.name()), e.os_code()),
        };
        Self {
            outcome,
            error,
            os_code,
            owns_namespace,
            report,
            pid: std::process::id(),
            checked_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
