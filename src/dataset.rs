use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

/// Cell text treated as a missing value besides the empty string.
pub const NA_MARKER: &str = ".";

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
];

#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("csv header is required")]
    MissingHeader,
}

/// How the values of a column are interpreted by the partitioning job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Date,
    Text,
}

/// A CSV file held in memory: a header row plus string cells.
///
/// Every row has exactly `columns.len()` cells; missing cells are stored as
/// empty strings and reported by [`Dataset::value`] as `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Dataset {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| DatasetError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_reader(reader);

        let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if columns.is_empty() || columns.iter().all(|c| c.is_empty()) {
            return Err(DatasetError::MissingHeader);
        }

        let width = columns.len();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let mut row: Vec<String> = record.iter().take(width).map(str::to_string).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(Dataset { columns, rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// The cell at `(row, col)`, or `None` when it holds a missing value.
    pub fn value(&self, row: usize, col: usize) -> Option<&str> {
        let cell = self.rows.get(row)?.get(col)?.as_str();
        if is_missing(cell) { None } else { Some(cell) }
    }

    pub fn column_kind(&self, col: usize) -> ColumnKind {
        let mut present = (0..self.rows.len())
            .filter_map(|r| self.value(r, col))
            .peekable();
        if present.peek().is_none() {
            return ColumnKind::Text;
        }

        let values: Vec<&str> = present.collect();
        if values.iter().all(|v| parse_number(v).is_some()) {
            ColumnKind::Numeric
        } else if values.iter().all(|v| parse_timestamp(v).is_some()) {
            ColumnKind::Date
        } else {
            ColumnKind::Text
        }
    }

    /// Numeric view of a column: numbers as-is, dates as Unix seconds.
    pub fn numeric_values(&self, col: usize, kind: ColumnKind) -> Vec<Option<f64>> {
        (0..self.rows.len())
            .map(|r| {
                self.value(r, col).and_then(|v| match kind {
                    ColumnKind::Numeric => parse_number(v),
                    ColumnKind::Date => parse_timestamp(v),
                    ColumnKind::Text => None,
                })
            })
            .collect()
    }
}

pub fn is_missing(cell: &str) -> bool {
    let cell = cell.trim();
    cell.is_empty() || cell == NA_MARKER
}

pub fn parse_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses a date or date-time cell into Unix seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp() as f64);
    }
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp() as f64);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp() as f64);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(text: &str) -> Dataset {
        Dataset::from_reader(text.as_bytes()).expect("csv should parse")
    }

    #[test]
    fn pads_short_records_and_truncates_long_ones() {
        let data = load("a,b,c\n1,2\n4,5,6,7\n");
        assert_eq!(data.rows[0], vec!["1", "2", ""]);
        assert_eq!(data.rows[1], vec!["4", "5", "6"]);
        assert_eq!(data.value(0, 2), None);
    }

    #[test]
    fn dot_is_a_missing_value() {
        let data = load("a\n.\n3\n");
        assert_eq!(data.value(0, 0), None);
        assert_eq!(data.value(1, 0), Some("3"));
    }

    #[test]
    fn infers_column_kinds() {
        let data = load(
            "num,when,city,blank\n1.5,2024-01-02,Rome,\n2,2024/03/04,Oslo,.\n.,05.06.2024,Rome,\n",
        );
        assert_eq!(data.column_kind(0), ColumnKind::Numeric);
        assert_eq!(data.column_kind(1), ColumnKind::Date);
        assert_eq!(data.column_kind(2), ColumnKind::Text);
        assert_eq!(data.column_kind(3), ColumnKind::Text);
    }

    #[test]
    fn bare_years_stay_numeric() {
        let data = load("year\n2020\n2021\n");
        assert_eq!(data.column_kind(0), ColumnKind::Numeric);
    }

    #[test]
    fn timestamps_order_like_dates() {
        let early = parse_timestamp("2023-12-31").unwrap();
        let late = parse_timestamp("2024-01-01 08:30:00").unwrap();
        assert!(early < late);
        assert_eq!(parse_timestamp("1970-01-01T00:00:00Z"), Some(0.0));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn empty_input_has_no_header() {
        assert!(matches!(
            Dataset::from_reader("".as_bytes()),
            Err(DatasetError::MissingHeader)
        ));
    }
}
