//! Ingestion - coerce posted JSON and uploaded CSV/Excel files into `AnomalyRecord`s
//!
//! Required fields are trimmed and must be non-empty. Optional fields are
//! coerced: blank strings become absent, unparseable dates become absent
//! with a warning.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use validator::Validate;

use tams_scoring::AnomalyRecord;

use crate::models::AnomalyInput;
use crate::{AppError, AppResult};

/// Date formats accepted for the detection date
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Date-time formats whose date part is kept
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%d/%m/%Y %H:%M"];

// ============================================================================
// JSON INPUT
// ============================================================================

/// Validate and coerce one posted anomaly
pub fn to_record(input: AnomalyInput) -> AppResult<AnomalyRecord> {
    let input = AnomalyInput {
        num_equipement: input.num_equipement.trim().to_string(),
        systeme: input.systeme.trim().to_string(),
        description: input.description.trim().to_string(),
        ..input
    };
    input.validate()?;

    Ok(AnomalyRecord {
        equipment_id: input.num_equipement,
        system: input.systeme,
        description: input.description,
        detected_on: input.date_detection.as_deref().and_then(parse_date),
        equipment_description: non_blank(input.description_equipement),
        owner_section: non_blank(input.section_proprietaire),
    })
}

/// Validate every posted anomaly; the first invalid one rejects the request
pub fn to_records(inputs: Vec<AnomalyInput>) -> AppResult<Vec<AnomalyRecord>> {
    inputs
        .into_iter()
        .enumerate()
        .map(|(idx, input)| {
            to_record(input).map_err(|e| AppError::ValidationError(format!("anomaly {}: {}", idx, e)))
        })
        .collect()
}

/// Coerce a detection date; `None` for blank or unrecognised values
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        });

    if parsed.is_none() {
        tracing::warn!("Ignoring unrecognised detection date '{}'", value);
    }
    parsed
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// CSV INPUT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    EquipmentId,
    System,
    Description,
    DetectedOn,
    EquipmentDescription,
    OwnerSection,
}

impl Column {
    fn display_name(&self) -> &'static str {
        match self {
            Column::EquipmentId => "Num_equipement",
            Column::System => "Systeme",
            Column::Description => "Description",
            Column::DetectedOn => "Date de détéction de l'anomalie",
            Column::EquipmentDescription => "Description de l'équipement",
            Column::OwnerSection => "Section propriétaire",
        }
    }

    /// Match a normalized header
    fn from_header(header: &str) -> Option<Self> {
        match normalize_header(header).as_str() {
            "num_equipement" | "numero_equipement" | "equipment_id" => Some(Column::EquipmentId),
            "systeme" | "system" => Some(Column::System),
            "description" => Some(Column::Description),
            "date_de_detection_de_l_anomalie" | "date_detection" | "detected_on" => {
                Some(Column::DetectedOn)
            }
            "description_de_l_equipement" | "description_equipement" | "equipment_description" => {
                Some(Column::EquipmentDescription)
            }
            "section_proprietaire" | "owner_section" => Some(Column::OwnerSection),
            _ => None,
        }
    }
}

/// Lowercase, strip accents and BOM, join words with '_'
fn normalize_header(header: &str) -> String {
    let mut normalized = String::with_capacity(header.len());
    let mut pending_separator = false;

    for c in header.trim_start_matches('\u{feff}').trim().to_lowercase().chars() {
        let c = match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        };

        if c.is_alphanumeric() {
            if pending_separator && !normalized.is_empty() {
                normalized.push('_');
            }
            pending_separator = false;
            normalized.push(c);
        } else {
            pending_separator = true;
        }
    }

    normalized
}

/// Spreadsheet exports in French locales use ';'
fn detect_delimiter(data: &[u8]) -> u8 {
    let first_line = data.split(|&b| b == b'\n').next().unwrap_or_default();
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    let commas = first_line.iter().filter(|&&b| b == b',').count();

    if semicolons > commas { b';' } else { b',' }
}

/// Records parsed from an upload, with the number of rows dropped
#[derive(Debug, Default)]
pub struct FileImport {
    pub records: Vec<AnomalyRecord>,
    pub skipped: usize,
}

impl FileImport {
    /// Keep a row if every required field is present, otherwise count it
    fn push_row<'a>(&mut self, columns: &[Option<Column>], cells: impl Iterator<Item = &'a str>, line: usize) {
        match record_from_row(columns, cells) {
            Some(record) => self.records.push(record),
            None => {
                tracing::warn!("Skipping line {}: missing required field", line);
                self.skipped += 1;
            }
        }
    }
}

/// Map a header row; unknown columns map to `None`
fn map_headers<'a>(headers: impl Iterator<Item = &'a str>) -> AppResult<Vec<Option<Column>>> {
    let columns: Vec<Option<Column>> = headers.map(Column::from_header).collect();

    for required in [Column::EquipmentId, Column::System, Column::Description] {
        if !columns.contains(&Some(required)) {
            return Err(AppError::ValidationError(format!(
                "File is missing required column '{}'",
                required.display_name()
            )));
        }
    }

    Ok(columns)
}

/// Build a record from one data row; `None` if a required field is blank
fn record_from_row<'a>(
    columns: &[Option<Column>],
    cells: impl Iterator<Item = &'a str>,
) -> Option<AnomalyRecord> {
    let mut record = AnomalyRecord::default();

    for (column, value) in columns.iter().zip(cells) {
        let value = value.trim();
        match column {
            Some(Column::EquipmentId) => record.equipment_id = value.to_string(),
            Some(Column::System) => record.system = value.to_string(),
            Some(Column::Description) => record.description = value.to_string(),
            Some(Column::DetectedOn) => record.detected_on = parse_date(value),
            Some(Column::EquipmentDescription) => {
                record.equipment_description = non_blank(Some(value.to_string()))
            }
            Some(Column::OwnerSection) => record.owner_section = non_blank(Some(value.to_string())),
            None => {}
        }
    }

    if record.equipment_id.is_empty() || record.system.is_empty() || record.description.is_empty() {
        return None;
    }
    Some(record)
}

/// Parse an uploaded CSV file
///
/// Unknown columns are ignored; rows that fail to parse or lack a required
/// field are skipped with a warning.
pub fn parse_csv(data: &[u8]) -> AppResult<FileImport> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(data))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(data);

    let columns = map_headers(rdr.headers()?.iter())?;
    let mut import = FileImport::default();

    for (idx, result) in rdr.records().enumerate() {
        // Header is line 1
        let line = idx + 2;

        match result {
            Ok(row) => import.push_row(&columns, row.iter(), line),
            Err(e) => {
                tracing::warn!("Skipping CSV line {}: {}", line, e);
                import.skipped += 1;
            }
        }
    }

    Ok(import)
}

// ============================================================================
// EXCEL INPUT
// ============================================================================

/// Parse the first sheet of an uploaded workbook (.xlsx or .xls)
///
/// The first non-empty row is the header; the same column aliases and skip
/// rules as CSV apply.
pub fn parse_excel(data: &[u8]) -> AppResult<FileImport> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(data))?;

    let sheet = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::ValidationError("Workbook has no sheets".to_string()))??;

    let mut rows = sheet
        .rows()
        .enumerate()
        .filter(|(_, row)| row.iter().any(|cell| !cell.is_empty()));

    let Some((_, header)) = rows.next() else {
        return Ok(FileImport::default());
    };

    let header: Vec<String> = header.iter().map(cell_text).collect();
    let columns = map_headers(header.iter().map(String::as_str))?;
    let mut import = FileImport::default();

    for (idx, row) in rows {
        let cells: Vec<String> = row.iter().map(cell_text).collect();
        import.push_row(&columns, cells.iter().map(String::as_str), idx + 1);
    }

    Ok(import)
}

/// Render a cell the way it would appear in a CSV export
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        other => other.to_string(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
