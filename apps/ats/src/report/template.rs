use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use tracing::warn;

use crate::report::{ReportError, ReportFormat};
use crate::rubric::Rubric;

/// What a spreadsheet column holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    CandidateName,
    FileName,
    Email,
    Phone,
    /// Score for the rubric category with this id.
    Category(String),
    TotalScore,
    Recommendation,
    Justification,
    Status,
    Error,
}

impl Column {
    /// Header used when the layout is generated rather than loaded.
    fn default_header(&self, rubric: &Rubric) -> String {
        match self {
            Column::CandidateName => "Candidate Name".to_string(),
            Column::FileName => "File".to_string(),
            Column::Email => "Email".to_string(),
            Column::Phone => "Contact Number".to_string(),
            Column::Category(id) => rubric
                .category(id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| id.clone()),
            Column::TotalScore => "Total Score".to_string(),
            Column::Recommendation => "recommendation".to_string(),
            Column::Justification => "justification".to_string(),
            Column::Status => "Status".to_string(),
            Column::Error => "Error".to_string(),
        }
    }

    fn from_fixed_header(header: &str) -> Option<Self> {
        let column = match header {
            "candidate name" | "candidate" | "name" => Column::CandidateName,
            "file" | "filename" | "file name" => Column::FileName,
            "email" | "e-mail" => Column::Email,
            "contact number" | "phone" | "phone number" => Column::Phone,
            "total score" | "overall score" | "total" => Column::TotalScore,
            "recommendation" => Column::Recommendation,
            "justification" => Column::Justification,
            "status" => Column::Status,
            "error" => Column::Error,
            _ => return None,
        };
        Some(column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemplateColumn {
    /// Header text exactly as it appears in the output.
    pub header: String,
    pub column: Column,
}

/// The spreadsheet layout: ordered header row and what each column holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportTemplate {
    pub columns: Vec<TemplateColumn>,
}

impl ReportTemplate {
    /// Candidate Name, Email, Contact Number, one column per category,
    /// Total Score, recommendation, justification, then File / Status / Error.
    pub fn from_rubric(rubric: &Rubric) -> Self {
        let mut columns = vec![Column::CandidateName, Column::Email, Column::Phone];
        columns.extend(rubric.categories.iter().map(|c| Column::Category(c.id.clone())));
        columns.extend([
            Column::TotalScore,
            Column::Recommendation,
            Column::Justification,
            Column::FileName,
            Column::Status,
            Column::Error,
        ]);

        Self {
            columns: columns
                .into_iter()
                .map(|column| TemplateColumn {
                    header: column.default_header(rubric),
                    column,
                })
                .collect(),
        }
    }

    /// Reads the header row of a CSV or XLSX template (picked by extension) and
    /// maps each header to a column. Headers match fixed labels or rubric
    /// category names / ids, ignoring case.
    pub fn load(path: &Path, rubric: &Rubric) -> Result<Self, ReportError> {
        let template_error = |reason: String| ReportError::TemplateLoad {
            path: path.display().to_string(),
            reason,
        };

        let raw = std::fs::read(path).map_err(|e| template_error(e.to_string()))?;
        let header_row = match ReportFormat::from_path(path) {
            Some(ReportFormat::Xlsx) => xlsx_header_row(raw),
            _ => csv_header_row(&raw),
        }
        .map_err(template_error)?;

        let columns = header_row
            .iter()
            .map(|header| {
                resolve_header(header, rubric)
                    .map(|column| TemplateColumn {
                        header: header.trim().to_string(),
                        column,
                    })
                    .ok_or_else(|| template_error(format!("unrecognised column '{}'", header.trim())))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if columns.is_empty() {
            return Err(template_error("template header row is empty".to_string()));
        }

        let template = Self { columns };
        for category in &rubric.categories {
            if !template.has_column(&Column::Category(category.id.clone())) {
                warn!("Template has no column for rubric category '{}'", category.id);
            }
        }
        Ok(template)
    }

    /// Loads from `path` when given, otherwise derives the layout from the rubric.
    pub fn load_or_default(path: Option<&Path>, rubric: &Rubric) -> Result<Self, ReportError> {
        match path {
            Some(p) => Self::load(p, rubric),
            None => Ok(Self::from_rubric(rubric)),
        }
    }

    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.header.as_str()).collect()
    }

    pub fn has_column(&self, column: &Column) -> bool {
        self.columns.iter().any(|c| &c.column == column)
    }
}

fn csv_header_row(raw: &[u8]) -> Result<Vec<String>, String> {
    let raw = raw.strip_prefix(b"\xEF\xBB\xBF".as_slice()).unwrap_or(raw);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(raw);
    match reader.records().next() {
        Some(record) => Ok(record
            .map_err(|e| e.to_string())?
            .iter()
            .map(str::to_string)
            .collect()),
        None => Err("template has no header row".to_string()),
    }
}

/// First row of the first worksheet; trailing empty cells are dropped.
fn xlsx_header_row(raw: Vec<u8>) -> Result<Vec<String>, String> {
    let mut workbook: Xlsx<Cursor<Vec<u8>>> = open_workbook_from_rs(Cursor::new(raw)).map_err(|e: calamine::XlsxError| e.to_string())?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| "workbook has no worksheets".to_string())?
        .map_err(|e| e.to_string())?;

    let mut headers: Vec<String> = match range.rows().next() {
        Some(row) => row.iter().map(Data::to_string).collect(),
        None => return Err("template has no header row".to_string()),
    };
    while headers.last().is_some_and(|h| h.trim().is_empty()) {
        headers.pop();
    }
    Ok(headers)
}

fn resolve_header(header: &str, rubric: &Rubric) -> Option<Column> {
    let wanted = header.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    if let Some(category) = rubric
        .categories
        .iter()
        .find(|c| c.name.trim().to_lowercase() == wanted || c.id.to_lowercase() == wanted)
    {
        return Some(Column::Category(category.id.clone()));
    }
    Column::from_fixed_header(&wanted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rubric::default_rubric;

    fn write_template(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.csv");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_default_layout_has_every_category() {
        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        assert_eq!(template.columns.len(), rubric.categories.len() + 9);
        assert_eq!(template.headers()[..3], ["Candidate Name", "Email", "Contact Number"]);
        assert_eq!(template.headers()[3], rubric.categories[0].name);
        assert!(template.has_column(&Column::Email));
        assert!(template.has_column(&Column::Phone));
        for c in &rubric.categories {
            assert!(template.has_column(&Column::Category(c.id.clone())));
        }
    }

    #[test]
    fn test_original_template_header_row_loads() {
        let rubric = default_rubric();
        let mut headers = vec!["Candidate Name".to_string()];
        headers.extend(rubric.categories.iter().map(|c| format!("\"{}\"", c.name)));
        headers.extend(["Total Score", "recommendation", "justification"].map(String::from));
        let (_dir, path) = write_template(&format!("\u{feff}{}\n", headers.join(",")));

        let template = ReportTemplate::load(&path, &rubric).unwrap();
        assert_eq!(template.columns.len(), 18);
        assert_eq!(template.columns[0].column, Column::CandidateName);
        assert_eq!(
            template.columns[1].column,
            Column::Category("core_experience_years".to_string())
        );
        assert_eq!(template.columns[17].column, Column::Justification);
        assert!(!template.has_column(&Column::Status));
    }

    #[test]
    fn test_xlsx_template_header_row_loads() {
        let rubric = default_rubric();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ATS_details.xlsx");

        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        let mut headers = vec!["Candidate Name".to_string()];
        headers.extend(rubric.categories.iter().map(|c| c.name.clone()));
        headers.extend(["Total Score", "recommendation", "justification"].map(String::from));
        for (col, header) in headers.iter().enumerate() {
            sheet.write_string(0, col as u16, header.as_str()).unwrap();
        }
        workbook.save(&path).unwrap();

        let template = ReportTemplate::load(&path, &rubric).unwrap();
        assert_eq!(template.columns.len(), 18);
        assert_eq!(template.columns[0].column, Column::CandidateName);
        assert_eq!(template.headers()[1], rubric.categories[0].name);
        assert_eq!(template.columns[17].column, Column::Justification);
    }

    #[test]
    fn test_xlsx_template_that_is_not_a_workbook_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("template.xlsx");
        std::fs::write(&path, "Candidate Name,Total Score\n").unwrap();
        let err = ReportTemplate::load(&path, &default_rubric()).unwrap_err();
        assert!(matches!(err, ReportError::TemplateLoad { .. }));
    }

    #[test]
    fn test_headers_match_ids_and_aliases_case_insensitively() {
        let (_dir, path) = write_template("NAME, skills_drafting ,E-mail,Phone,OVERALL SCORE\n");
        let template = ReportTemplate::load(&path, &default_rubric()).unwrap();
        let columns: Vec<Column> = template.columns.into_iter().map(|c| c.column).collect();
        assert_eq!(
            columns,
            vec![
                Column::CandidateName,
                Column::Category("skills_drafting".to_string()),
                Column::Email,
                Column::Phone,
                Column::TotalScore,
            ]
        );
    }

    #[test]
    fn test_unknown_header_is_template_error() {
        let (_dir, path) = write_template("Candidate Name,Favourite Colour\n");
        let err = ReportTemplate::load(&path, &default_rubric()).unwrap_err();
        match err {
            ReportError::TemplateLoad { reason, .. } => assert!(reason.contains("Favourite Colour")),
            other => panic!("expected template error, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_template_file_is_error() {
        let (_dir, path) = write_template("");
        let err = ReportTemplate::load(&path, &default_rubric()).unwrap_err();
        assert!(matches!(err, ReportError::TemplateLoad { .. }));
    }

    #[test]
    fn test_missing_template_file_is_error() {
        let err = ReportTemplate::load(Path::new("/no/such/template.csv"), &default_rubric()).unwrap_err();
        assert!(matches!(err, ReportError::TemplateLoad { .. }));
    }
}
