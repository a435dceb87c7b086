//! Report writer: turns candidate outcomes into the ATS spreadsheet (CSV or XLSX).
//!
//! The column layout comes from a template header row when one is configured,
//! otherwise it is derived from the rubric.

pub mod template;
pub mod writer;

use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

pub use template::ReportTemplate;
pub use writer::write_report;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to load report template {path}: {reason}")]
    TemplateLoad { path: String, reason: String },

    #[error("Failed to serialize report: {0}")]
    Serialize(String),

    #[error("Unsupported report format '{0}': expected csv or xlsx")]
    UnsupportedFormat(String),
}

/// Spreadsheet flavour of the report and of template files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Csv,
    Xlsx,
}

impl ReportFormat {
    /// Picks the format from the file extension, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
    }

    pub fn extension(self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Xlsx => "xlsx",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ReportFormat::Csv => "text/csv; charset=utf-8",
            ReportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "xlsx" => Ok(ReportFormat::Xlsx),
            other => Err(ReportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_path_and_name() {
        assert_eq!(ReportFormat::from_path(Path::new("out/ATS.XLSX")), Some(ReportFormat::Xlsx));
        assert_eq!(ReportFormat::from_path(Path::new("results.csv")), Some(ReportFormat::Csv));
        assert_eq!(ReportFormat::from_path(Path::new("results.ods")), None);
        assert_eq!(ReportFormat::from_path(Path::new("results")), None);
        assert_eq!(".xlsx".parse::<ReportFormat>().unwrap(), ReportFormat::Xlsx);
        assert!(matches!(
            "pdf".parse::<ReportFormat>(),
            Err(ReportError::UnsupportedFormat(f)) if f == "pdf"
        ));
    }
}
