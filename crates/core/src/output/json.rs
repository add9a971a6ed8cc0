use super::FormatError;
use crate::models::BundleReport;

/// Convert a BundleReport to pretty-printed JSON
pub fn to_json(report: &BundleReport) -> Result<String, FormatError> {
    serde_json::to_string_pretty(report).map_err(FormatError::from)
}

/// Convert a BundleReport to compact JSON
#[allow(dead_code)]
pub fn to_json_compact(report: &BundleReport) -> Result<String, FormatError> {
    serde_json::to_string(report).map_err(FormatError::from)
}
