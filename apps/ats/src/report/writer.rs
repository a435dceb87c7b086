use rust_xlsxwriter::{Format, Workbook, XlsxError};
use tracing::debug;

use crate::evaluation::models::{CandidateOutcome, EvaluationResult, FailedCandidate};
use crate::report::template::{Column, ReportTemplate};
use crate::report::{ReportError, ReportFormat};
use crate::rubric::{Recommendation, Rubric};

const SHEET_NAME: &str = "ATS Details";

/// One spreadsheet value before it is rendered for a format.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Blank,
}

impl Cell {
    fn text(value: &str) -> Self {
        Cell::Text(value.to_string())
    }
}

/// Serializes one row per outcome, in the order given, under the template's
/// header row. For CSV the same outcomes and template always give the same bytes.
pub fn write_report(
    outcomes: &[CandidateOutcome],
    template: &ReportTemplate,
    rubric: &Rubric,
    format: ReportFormat,
) -> Result<Vec<u8>, ReportError> {
    let rows: Vec<Vec<Cell>> = outcomes
        .iter()
        .map(|outcome| template.columns.iter().map(|c| cell(outcome, &c.column)).collect())
        .collect();

    let bytes = match format {
        ReportFormat::Csv => write_csv(template, &rows),
        ReportFormat::Xlsx => write_xlsx(template, &rows)
            .map_err(|e| ReportError::Serialize(e.to_string())),
    }?;

    debug!(
        "Report written as {}: {} rows, {} columns ({} rubric categories), {} bytes",
        format.extension(),
        outcomes.len(),
        template.columns.len(),
        rubric.categories.len(),
        bytes.len()
    );
    Ok(bytes)
}

fn write_csv(template: &ReportTemplate, rows: &[Vec<Cell>]) -> Result<Vec<u8>, ReportError> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer
        .write_record(template.headers())
        .map_err(|e| ReportError::Serialize(e.to_string()))?;

    for row in rows {
        let record: Vec<String> = row
            .iter()
            .map(|cell| match cell {
                Cell::Text(value) => text(value),
                Cell::Number(value) => format_number(*value),
                Cell::Blank => String::new(),
            })
            .collect();
        writer
            .write_record(&record)
            .map_err(|e| ReportError::Serialize(e.to_string()))?;
    }

    writer
        .into_inner()
        .map_err(|e| ReportError::Serialize(e.to_string()))
}

/// Strings are written as shared strings, never formulas; scores stay numeric.
fn write_xlsx(template: &ReportTemplate, rows: &[Vec<Cell>]) -> Result<Vec<u8>, XlsxError> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    for (col, header) in (0u16..).zip(template.headers()) {
        sheet.write_string_with_format(0, col, header, &bold)?;
    }
    for (row_idx, row) in (1u32..).zip(rows) {
        for (col, cell) in (0u16..).zip(row) {
            match cell {
                Cell::Text(value) => sheet.write_string(row_idx, col, value.as_str())?,
                Cell::Number(value) => sheet.write_number(row_idx, col, round2(*value))?,
                Cell::Blank => continue,
            };
        }
    }

    workbook.save_to_buffer()
}

fn cell(outcome: &CandidateOutcome, column: &Column) -> Cell {
    match outcome {
        CandidateOutcome::Evaluated(result) => evaluated_cell(result, column),
        CandidateOutcome::Failed(failure) => failed_cell(failure, column),
    }
}

fn evaluated_cell(result: &EvaluationResult, column: &Column) -> Cell {
    match column {
        Column::CandidateName => Cell::text(&result.candidate.name),
        Column::FileName => Cell::text(&result.filename),
        Column::Email => Cell::text(&result.candidate.email),
        Column::Phone => Cell::text(&result.candidate.phone),
        Column::Category(id) => result.score_for(id).map_or(Cell::Blank, Cell::Number),
        Column::TotalScore => Cell::Number(result.overall_score),
        Column::Recommendation => Cell::text(result.recommendation.label()),
        Column::Justification => Cell::text(&result.justification),
        Column::Status => Cell::text("evaluated"),
        Column::Error => Cell::Blank,
    }
}

/// Failed rows keep their place: filename as the name, blank scores.
fn failed_cell(failure: &FailedCandidate, column: &Column) -> Cell {
    match column {
        Column::CandidateName | Column::FileName => Cell::text(&failure.filename),
        Column::Recommendation => Cell::text(Recommendation::NotSuitable.label()),
        Column::Justification => Cell::Text(format!("Not evaluated: {} failed", failure.stage)),
        Column::Status => Cell::text("failed"),
        Column::Error => Cell::text(&failure.reason),
        Column::Email | Column::Phone | Column::Category(_) | Column::TotalScore => Cell::Blank,
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Two decimals with trailing zeros trimmed: 8 → "8", 7.5 → "7.5", 1/3 → "0.33".
pub fn format_number(value: f64) -> String {
    let fixed = format!("{value:.2}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

/// Free text from resumes or the model must not be read as a formula by spreadsheet apps.
fn text(value: &str) -> String {
    match value.chars().next() {
        Some('=' | '+' | '-' | '@') => format!("'{value}"),
        _ => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::models::{CandidateInfo, FailureStage};
    use crate::rubric::default_rubric;

    fn evaluated(name: &str, score: f64, rubric: &Rubric) -> CandidateOutcome {
        let scores = vec![score; rubric.categories.len()];
        CandidateOutcome::Evaluated(EvaluationResult::from_scores(
            format!("{}.pdf", name.to_lowercase().replace(' ', "_")),
            CandidateInfo {
                name: name.to_string(),
                email: "someone@example.com".to_string(),
                phone: "+91 98765 43210".to_string(),
            },
            &scores,
            "Drafted NDAs, coordinated PCT filings",
            rubric,
        ))
    }

    fn failed(filename: &str) -> CandidateOutcome {
        CandidateOutcome::Failed(FailedCandidate {
            filename: filename.to_string(),
            stage: FailureStage::Extraction,
            reason: "Corrupt or unreadable file: bad xref".to_string(),
        })
    }

    fn parse(bytes: &[u8]) -> Vec<csv::StringRecord> {
        csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(bytes)
            .records()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_one_row_per_outcome_in_order() {
        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        let outcomes = vec![
            evaluated("Priya Sharma", 8.0, &rubric),
            failed("broken.pdf"),
            evaluated("Tom Baker", 1.5, &rubric),
        ];

        let rows = parse(&write_report(&outcomes, &template, &rubric, ReportFormat::Csv).unwrap());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].get(0), Some("Candidate Name"));
        assert_eq!(rows[1].get(0), Some("Priya Sharma"));
        assert_eq!(rows[2].get(0), Some("broken.pdf"));
        assert_eq!(rows[3].get(0), Some("Tom Baker"));
        for row in &rows {
            assert_eq!(row.len(), template.columns.len());
        }
    }

    #[test]
    fn test_evaluated_row_cells() {
        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        let rows = parse(&write_report(&[evaluated("Priya Sharma", 8.0, &rubric)], &template, &rubric, ReportFormat::Csv).unwrap());
        let headers = &rows[0];
        let row = &rows[1];
        let at = |header: &str| {
            let idx = headers.iter().position(|h| h == header).unwrap();
            row.get(idx).unwrap().to_string()
        };

        assert_eq!(at(&rubric.categories[0].name), "8");
        assert_eq!(at("Total Score"), "112");
        assert_eq!(at("recommendation"), "Strongly Recommended");
        assert_eq!(at("Status"), "evaluated");
        assert_eq!(at("Error"), "");
        assert_eq!(at("File"), "priya_sharma.pdf");
        assert_eq!(at("Email"), "someone@example.com");
        assert_eq!(at("Contact Number"), "'+91 98765 43210");
    }

    #[test]
    fn test_xlsx_report_keeps_layout_and_numeric_scores() {
        use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        let outcomes = vec![evaluated("Priya Sharma", 8.0, &rubric), failed("broken.pdf")];
        let bytes = write_report(&outcomes, &template, &rubric, ReportFormat::Xlsx).unwrap();

        let mut workbook: Xlsx<_> = open_workbook_from_rs(std::io::Cursor::new(bytes)).unwrap();
        let range = workbook.worksheet_range(SHEET_NAME).unwrap();
        let rows: Vec<&[Data]> = range.rows().collect();
        assert_eq!(rows.len(), 3);

        let at = |row: usize, header: &str| {
            let idx = template.headers().iter().position(|h| *h == header).unwrap();
            rows[row][idx].clone()
        };
        assert_eq!(at(0, "Candidate Name"), Data::String("Candidate Name".to_string()));
        assert_eq!(at(1, "Candidate Name"), Data::String("Priya Sharma".to_string()));
        assert_eq!(at(1, "Total Score"), Data::Float(112.0));
        assert_eq!(at(1, &rubric.categories[0].name), Data::Float(8.0));
        // Written as a string, so no quote prefix is needed.
        assert_eq!(at(1, "Contact Number"), Data::String("+91 98765 43210".to_string()));
        assert_eq!(at(2, "Candidate Name"), Data::String("broken.pdf".to_string()));
        assert_eq!(at(2, "Status"), Data::String("failed".to_string()));
        assert_eq!(at(2, "Total Score"), Data::Empty);
    }

    #[test]
    fn test_failed_row_is_flagged_with_blank_scores() {
        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        let rows = parse(&write_report(&[failed("broken.pdf")], &template, &rubric, ReportFormat::Csv).unwrap());
        let row = &rows[1];

        // Email, Contact Number, every category and Total Score.
        for idx in 1..=rubric.categories.len() + 3 {
            assert_eq!(row.get(idx), Some(""), "column {idx} should be blank");
        }
        let last = row.len() - 1;
        assert_eq!(row.get(last), Some("Corrupt or unreadable file: bad xref"));
        assert_eq!(row.get(last - 1), Some("failed"));
        assert!(row.iter().any(|c| c == "Not Suitable"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        let outcomes = vec![evaluated("A", 1.0 / 3.0, &rubric), failed("b.doc")];
        let first = write_report(&outcomes, &template, &rubric, ReportFormat::Csv).unwrap();
        let second = write_report(&outcomes, &template, &rubric, ReportFormat::Csv).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_batch_writes_header_only() {
        let rubric = default_rubric();
        let template = ReportTemplate::from_rubric(&rubric);
        let rows = parse(&write_report(&[], &template, &rubric, ReportFormat::Csv).unwrap());
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(8.0), "8");
        assert_eq!(format_number(7.5), "7.5");
        assert_eq!(format_number(1.0 / 3.0), "0.33");
        assert_eq!(format_number(0.0), "0");
        assert_eq!(format_number(112.004), "112");
    }

    #[test]
    fn test_formula_like_text_is_neutralized() {
        assert_eq!(text("=HYPERLINK(\"x\")"), "'=HYPERLINK(\"x\")");
        assert_eq!(text("@sum"), "'@sum");
        assert_eq!(text("Priya"), "Priya");
    }
}
