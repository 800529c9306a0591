//! Training dataset loading from CSV or Excel files.

use std::collections::HashMap;
use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use log::debug;
use nalgebra::DMatrix;

use crate::domain::{CATEGORICAL_COLUMNS, FEATURE_COLUMNS, IGNORED_COLUMNS, TARGET_COLUMNS};
use crate::encoder::{EncoderTable, LabelEncoder};
use crate::error::DatasetError;

/// A single cell as read from the source file.
#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(_) => false,
        }
    }
}

/// Header plus data rows, before any typing.
struct RawTable {
    header: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

/// Encoded training data ready for the forest.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// One row per sample, columns in `FEATURE_COLUMNS` order.
    pub features: DMatrix<f64>,
    /// One row per sample, columns in `TARGET_COLUMNS` order.
    pub targets: DMatrix<f64>,
    /// Encoders fitted on the categorical columns.
    pub encoders: EncoderTable,
}

impl Dataset {
    /// Returns the number of samples.
    pub fn n_rows(&self) -> usize {
        self.features.nrows()
    }
}

/// Finds column indices from the header row.
struct ColumnIndices {
    by_name: HashMap<&'static str, usize>,
}

impl ColumnIndices {
    fn from_header(header: &[String]) -> Result<Self, DatasetError> {
        let find_column = |name: &'static str| -> Result<usize, DatasetError> {
            header
                .iter()
                .position(|cell| cell.trim().eq_ignore_ascii_case(name))
                .ok_or_else(|| DatasetError::MissingColumn(name.to_string()))
        };

        let mut by_name = HashMap::new();
        for name in FEATURE_COLUMNS.iter().chain(TARGET_COLUMNS.iter()) {
            by_name.insert(*name, find_column(*name)?);
        }

        for name in IGNORED_COLUMNS {
            if find_column(name).is_ok() {
                debug!("dropping column {}", name);
            }
        }

        Ok(Self { by_name })
    }

    fn get(&self, name: &str) -> usize {
        self.by_name[name]
    }
}

/// Loads and encodes a training dataset.
///
/// The format is chosen from the file extension: `.csv` or `.xlsx`.
///
/// # Errors
/// Any missing column, empty label or unparseable number is fatal; the
/// error names the offending row and column.
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset, DatasetError> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(DatasetError::FileNotFound(path.display().to_string()));
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let table = match extension.as_str() {
        "csv" => read_csv(path)?,
        "xlsx" => read_xlsx(path)?,
        _ => return Err(DatasetError::UnsupportedFormat(path.display().to_string())),
    };

    build_dataset(table)
}

/// Reads a CSV file with a header row.
fn read_csv(path: &Path) -> Result<RawTable, DatasetError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| DatasetError::CannotRead(format!("{}: {}", path.display(), e)))?;

    let header = reader
        .headers()
        .map_err(|e| DatasetError::CannotRead(format!("{}: {}", path.display(), e)))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| DatasetError::CannotRead(format!("{}: {}", path.display(), e)))?;
        rows.push(record.iter().map(|s| Cell::Text(s.to_string())).collect());
    }

    Ok(RawTable { header, rows })
}

/// Reads the first worksheet of an Excel workbook.
fn read_xlsx(path: &Path) -> Result<RawTable, DatasetError> {
    let mut workbook: Xlsx<_> = open_workbook(path)
        .map_err(|e| DatasetError::CannotRead(format!("{}: {}", path.display(), e)))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let sheet_name = sheet_names
        .first()
        .ok_or_else(|| DatasetError::InvalidFormat("workbook has no sheets".to_string()))?;

    let range = workbook.worksheet_range(sheet_name).map_err(|e| {
        DatasetError::CannotRead(format!("cannot read sheet '{}': {}", sheet_name, e))
    })?;

    let mut rows = range.rows();

    let header = rows
        .next()
        .ok_or_else(|| DatasetError::InvalidFormat("empty worksheet".to_string()))?
        .iter()
        .map(|cell| match cell {
            Data::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    let rows = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Ok(RawTable { header, rows })
}

fn convert_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty => Cell::Empty,
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

/// Types, encodes and assembles the feature and target matrices.
fn build_dataset(table: RawTable) -> Result<Dataset, DatasetError> {
    let indices = ColumnIndices::from_header(&table.header)?;

    // (source row number, cells), skipping blank rows at the end of sheets
    let rows: Vec<(usize, &Vec<Cell>)> = table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| (idx + 2, row))
        .filter(|(_, row)| !row.iter().all(Cell::is_empty))
        .collect();

    if rows.is_empty() {
        return Err(DatasetError::InvalidFormat("no data rows".to_string()));
    }

    // Fit one encoder per categorical column
    let mut encoders = EncoderTable::new();
    for column in CATEGORICAL_COLUMNS {
        let col_idx = indices.get(column);
        let labels = rows
            .iter()
            .map(|(row_num, row)| parse_label(row.get(col_idx), *row_num, column))
            .collect::<Result<Vec<_>, _>>()?;
        encoders.insert(LabelEncoder::fit(column, labels));
    }

    let n = rows.len();
    let mut features = Vec::with_capacity(n * FEATURE_COLUMNS.len());
    let mut targets = Vec::with_capacity(n * TARGET_COLUMNS.len());

    for (row_num, row) in &rows {
        for column in FEATURE_COLUMNS {
            let cell = row.get(indices.get(column));
            let value = if CATEGORICAL_COLUMNS.contains(&column) {
                let label = parse_label(cell, *row_num, column)?;
                encoders
                    .encode(column, &label)
                    .map_err(|e| DatasetError::InvalidFormat(e.to_string()))? as f64
            } else {
                parse_number(cell, *row_num, column)?
            };
            features.push(value);
        }

        for column in TARGET_COLUMNS {
            targets.push(parse_number(row.get(indices.get(column)), *row_num, column)?);
        }
    }

    Ok(Dataset {
        features: DMatrix::from_row_slice(n, FEATURE_COLUMNS.len(), &features),
        targets: DMatrix::from_row_slice(n, TARGET_COLUMNS.len(), &targets),
        encoders,
    })
}

/// Parses a numeric cell.
fn parse_number(cell: Option<&Cell>, row: usize, column: &str) -> Result<f64, DatasetError> {
    let invalid = |value: String| DatasetError::InvalidNumber {
        row,
        column: column.to_string(),
        value,
    };

    match cell {
        Some(Cell::Number(f)) if f.is_finite() => Ok(*f),
        Some(Cell::Number(f)) => Err(invalid(f.to_string())),
        Some(Cell::Text(s)) => match s.trim().parse::<f64>() {
            Ok(f) if f.is_finite() => Ok(f),
            _ => Err(invalid(s.clone())),
        },
        Some(Cell::Empty) | None => Err(invalid("(empty)".to_string())),
    }
}

/// Parses a categorical cell. Labels are kept verbatim.
fn parse_label(cell: Option<&Cell>, row: usize, column: &str) -> Result<String, DatasetError> {
    match cell {
        Some(c) if c.is_empty() => Err(DatasetError::EmptyLabel {
            row,
            column: column.to_string(),
        }),
        Some(Cell::Text(s)) => Ok(s.clone()),
        Some(Cell::Number(f)) => Ok(f.to_string()),
        _ => Err(DatasetError::EmptyLabel {
            row,
            column: column.to_string(),
        }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    pub(crate) const HEADER: &str = "Age,Gender,Height,Weight,BMI,Activity_Level,Activity_Type,Activity_Duration,Work_Type,Sleep_Hours,Diet,Allergies,Health_Condition,Fitness_Goal,Target_Weight,Timeline,Calories_Intake,Protein_Intake,Recommended_Exercises,Recommended_Sleep,Exercise_Duration";

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    fn sample_csv() -> String {
        format!(
            "{HEADER}\n\
             30,Male,175,70,22.9,Active,Gym,45,Desk job,6,Vegetarian,None,None,Weight Loss,65,90,2100,120,Cardio,7.5,50\n\
             25,Female,160,55,21.5,Sedentary,Yoga,20,Student,8,Vegan,Nuts,Asthma,Maintenance,55,60,1800,80,Yoga,8,30\n"
        )
    }

    #[test]
    fn test_load_csv_shapes() {
        let file = write_csv(&sample_csv());
        let data = load_dataset(file.path()).unwrap();

        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.features.ncols(), 16);
        assert_eq!(data.targets.ncols(), 3);
        assert_eq!(data.encoders.iter().count(), 8);
    }

    #[test]
    fn test_load_xlsx_matches_csv() {
        let xlsx = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
        let mut book = umya_spreadsheet::new_file();
        let sheet = book.get_sheet_mut(&0).unwrap();
        for (r, line) in sample_csv().lines().enumerate() {
            for (c, value) in line.split(',').enumerate() {
                let cell = sheet.get_cell_mut((c as u32 + 1, r as u32 + 1));
                match value.parse::<f64>() {
                    Ok(n) if r > 0 => {
                        cell.set_value_number(n);
                    }
                    _ => {
                        cell.set_value(value);
                    }
                }
            }
        }
        umya_spreadsheet::writer::xlsx::write(&book, xlsx.path()).unwrap();

        let csv = write_csv(&sample_csv());
        let from_xlsx = load_dataset(xlsx.path()).unwrap();
        let from_csv = load_dataset(csv.path()).unwrap();

        assert_eq!(from_xlsx.n_rows(), 2);
        assert_eq!(from_xlsx.features, from_csv.features);
        assert_eq!(from_xlsx.targets, from_csv.targets);
        assert_eq!(from_xlsx.encoders, from_csv.encoders);
    }

    #[test]
    fn test_load_csv_encodes_in_feature_order() {
        let file = write_csv(&sample_csv());
        let data = load_dataset(file.path()).unwrap();

        // Row 0: Age, Gender(Male → 1 of [Female, Male]), Height, Weight, BMI
        assert_eq!(data.features[(0, 0)], 30.0);
        assert_eq!(data.features[(0, 1)], 1.0);
        assert_eq!(data.features[(0, 2)], 175.0);
        assert_eq!(data.features[(0, 3)], 70.0);
        assert_eq!(data.features[(0, 4)], 22.9);
        // Activity_Duration
        assert_eq!(data.features[(0, 7)], 45.0);
        // Timeline
        assert_eq!(data.features[(1, 15)], 60.0);

        // Targets: Calories, Protein, Exercise_Duration (not Recommended_Sleep)
        assert_eq!(data.targets[(0, 0)], 2100.0);
        assert_eq!(data.targets[(0, 1)], 120.0);
        assert_eq!(data.targets[(0, 2)], 50.0);
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let csv = sample_csv().replacen("Age,", " age ,", 1);
        let file = write_csv(&csv);
        assert!(load_dataset(file.path()).is_ok());
    }

    #[test]
    fn test_missing_column_is_fatal() {
        let csv = sample_csv().replacen("Timeline", "Deadline", 1);
        let file = write_csv(&csv);
        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(c) if c == "Timeline"));
    }

    #[test]
    fn test_invalid_number_names_row_and_column() {
        let csv = sample_csv().replacen("30,Male", "thirty,Male", 1);
        let file = write_csv(&csv);
        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::InvalidNumber { row: 2, ref column, .. } if column == "Age"
        ));
    }

    #[test]
    fn test_empty_label_is_fatal() {
        let csv = sample_csv().replacen(",Male,", ",,", 1);
        let file = write_csv(&csv);
        let err = load_dataset(file.path()).unwrap_err();
        assert!(matches!(err, DatasetError::EmptyLabel { row: 2, .. }));
    }

    #[test]
    fn test_header_only_is_fatal() {
        let file = write_csv(&format!("{HEADER}\n"));
        assert!(matches!(
            load_dataset(file.path()),
            Err(DatasetError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_unsupported_extension() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        file.write_all(b"{}").unwrap();
        assert!(matches!(
            load_dataset(file.path()),
            Err(DatasetError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_file_not_found() {
        assert!(matches!(
            load_dataset("/nonexistent/fitness.csv"),
            Err(DatasetError::FileNotFound(_))
        ));
    }
}
