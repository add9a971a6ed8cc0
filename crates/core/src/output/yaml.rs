use super::FormatError;
use crate::models::BundleReport;

/// Convert a BundleReport to YAML
pub fn to_yaml(report: &BundleReport) -> Result<String, FormatError> {
    serde_yaml::to_string(report).map_err(FormatError::from)
}
