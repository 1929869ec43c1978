//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "Labelled numeric tables and their text and binary encodings."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Timestamp layout used for time-indexed rows in text tables.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current binary envelope version.
pub const TABLE_VERSION: u16 = 1;

/// Errors raised while building or decoding tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    /// A row does not have one value per column.
    #[error("row {row} has {found} values, expected {expected}")]
    Shape {
        /// Zero-based row position.
        row: usize,
        /// Number of columns.
        expected: usize,
        /// Number of values supplied.
        found: usize,
    },
    /// A column label could not be converted to an integer.
    #[error("column label '{0}' is not an integer")]
    ColumnLabel(String),
    /// A cell could not be parsed as a number.
    #[error("invalid value '{value}' in row {row}, column {column}")]
    Value {
        /// Zero-based row position.
        row: usize,
        /// Zero-based column position.
        column: usize,
        /// Raw cell text.
        value: String,
    },
    /// The text table has no header row.
    #[error("table has no header row")]
    MissingHeader,
    /// The binary envelope failed its integrity check.
    #[error("table hash mismatch")]
    HashMismatch,
    /// The binary envelope was written by a newer release.
    #[error("unsupported table version {0}")]
    Version(u16),
    /// Wrapper for CSV failures.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Wrapper for CBOR failures.
    #[error("cbor error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    /// Wrapper for IO errors raised while flushing text output.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

type Result<T> = std::result::Result<T, TableError>;

/// Label of a table row.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IndexValue {
    /// Hourly (or coarser) timestamp.
    Time(NaiveDateTime),
    /// Integer identifier.
    Int(i64),
    /// Free-form label.
    Text(String),
}

impl IndexValue {
    /// Timestamp carried by the label, if any.
    pub fn as_time(&self) -> Option<NaiveDateTime> {
        match self {
            IndexValue::Time(ts) => Some(*ts),
            _ => None,
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Time(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
            IndexValue::Int(value) => write!(f, "{value}"),
            IndexValue::Text(value) => f.write_str(value),
        }
    }
}

/// Label of a table column: a plant, branch or bus id, or a name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ColumnKey {
    /// Numeric identifier.
    Int(i64),
    /// Textual label.
    Text(String),
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::Int(value) => write!(f, "{value}"),
            ColumnKey::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for ColumnKey {
    fn from(value: i64) -> Self {
        ColumnKey::Int(value)
    }
}

impl From<&str> for ColumnKey {
    fn from(value: &str) -> Self {
        ColumnKey::Text(value.to_owned())
    }
}

/// How column labels of a text table are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnTyping {
    /// Labels are integer identifiers.
    #[default]
    Integer,
    /// Labels stay textual.
    Text,
}

impl ColumnTyping {
    /// Typing applied when reading the file at `path`.
    ///
    /// Flexibility profiles are keyed by names; everything else by ids.
    pub fn for_path(path: &str) -> Self {
        if path.contains("demand_flexibility") {
            ColumnTyping::Text
        } else {
            ColumnTyping::Integer
        }
    }

    fn label(&self, raw: &str) -> Result<ColumnKey> {
        match self {
            ColumnTyping::Text => Ok(ColumnKey::Text(raw.to_owned())),
            ColumnTyping::Integer => raw
                .trim()
                .parse::<i64>()
                .map(ColumnKey::Int)
                .map_err(|_| TableError::ColumnLabel(raw.to_owned())),
        }
    }
}

/// Dense table of `f64` values with labelled rows and columns.
///
/// Missing values are stored as `NaN`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    index_name: Option<String>,
    index: Vec<IndexValue>,
    columns: Vec<ColumnKey>,
    values: Vec<f64>,
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.index_name == other.index_name
            && self.index == other.index
            && self.columns == other.columns
            && self.values.len() == other.values.len()
            && self
                .values
                .iter()
                .zip(&other.values)
                .all(|(a, b)| a == b || (a.is_nan() && b.is_nan()))
    }
}

#[derive(Serialize, Deserialize)]
struct TableEnvelope {
    version: u16,
    hash: String,
    table: Table,
}

impl Table {
    /// Build a table from row-major values.
    pub fn new(
        index_name: Option<String>,
        index: Vec<IndexValue>,
        columns: Vec<ColumnKey>,
        rows: Vec<Vec<f64>>,
    ) -> Result<Self> {
        let expected = columns.len();
        if rows.len() != index.len() {
            return Err(TableError::Shape {
                row: rows.len().min(index.len()),
                expected: index.len(),
                found: rows.len(),
            });
        }
        let mut values = Vec::with_capacity(expected * rows.len());
        for (row, data) in rows.into_iter().enumerate() {
            if data.len() != expected {
                return Err(TableError::Shape {
                    row,
                    expected,
                    found: data.len(),
                });
            }
            values.extend(data);
        }
        Ok(Self {
            index_name,
            index,
            columns,
            values,
        })
    }

    /// Table of the given labels filled with zeros.
    pub fn zeros(index_name: Option<String>, index: Vec<IndexValue>, columns: Vec<ColumnKey>) -> Self {
        let values = vec![0.0; index.len() * columns.len()];
        Self {
            index_name,
            index,
            columns,
            values,
        }
    }

    /// Name of the row label column.
    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    /// Row labels.
    pub fn index(&self) -> &[IndexValue] {
        &self.index
    }

    /// Column labels.
    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Values of one row.
    pub fn row(&self, row: usize) -> &[f64] {
        let width = self.n_cols();
        &self.values[row * width..(row + 1) * width]
    }

    /// Single cell.
    pub fn value(&self, row: usize, column: usize) -> f64 {
        self.values[row * self.n_cols() + column]
    }

    /// Overwrite a single cell.
    pub fn set(&mut self, row: usize, column: usize, value: f64) {
        let width = self.n_cols();
        self.values[row * width + column] = value;
    }

    /// Position of a column label.
    pub fn column_position(&self, key: &ColumnKey) -> Option<usize> {
        self.columns.iter().position(|column| column == key)
    }

    /// All values of one column, top to bottom.
    pub fn column(&self, key: &ColumnKey) -> Option<Vec<f64>> {
        let position = self.column_position(key)?;
        Some((0..self.n_rows()).map(|row| self.value(row, position)).collect())
    }

    /// Multiply every row whose timestamp lies in `[start, end]` by `factor`.
    ///
    /// Returns the number of rows scaled.
    pub fn scale_rows_between(
        &mut self,
        start: NaiveDateTime,
        end: NaiveDateTime,
        factor: f64,
    ) -> usize {
        let width = self.n_cols();
        let mut scaled = 0;
        for (row, label) in self.index.iter().enumerate() {
            match label.as_time() {
                Some(ts) if ts >= start && ts <= end => {
                    for value in &mut self.values[row * width..(row + 1) * width] {
                        *value *= factor;
                    }
                    scaled += 1;
                }
                _ => {}
            }
        }
        scaled
    }

    /// Encode as comma-separated text with a header row.
    ///
    /// The first column carries the row labels; missing values are empty.
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        let mut header = Vec::with_capacity(self.n_cols() + 1);
        header.push(self.index_name.clone().unwrap_or_default());
        header.extend(self.columns.iter().map(ToString::to_string));
        writer.write_record(&header)?;

        for (row, label) in self.index.iter().enumerate() {
            let mut record = Vec::with_capacity(self.n_cols() + 1);
            record.push(label.to_string());
            record.extend(self.row(row).iter().map(|value| format_value(*value)));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|err| TableError::Io(err.into_error()))
    }

    /// Decode comma-separated text written by [`Table::to_csv`] or a
    /// spreadsheet export with the same layout.
    ///
    /// Row labels become timestamps when every label parses as one, integers
    /// when every label is an integer, and text otherwise.
    pub fn from_csv(data: &[u8], typing: ColumnTyping) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(data);
        let mut records = reader.records();
        let header = match records.next() {
            Some(record) => record?,
            None => return Err(TableError::MissingHeader),
        };
        let mut fields = header.iter();
        let index_name = fields
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_owned);
        let columns = fields
            .map(|raw| typing.label(raw))
            .collect::<Result<Vec<_>>>()?;

        let mut labels = Vec::new();
        let mut rows = Vec::new();
        for (row, record) in records.enumerate() {
            let record = record?;
            let mut cells = record.iter();
            labels.push(cells.next().unwrap_or_default().to_owned());
            let values = cells
                .enumerate()
                .map(|(column, cell)| parse_value(row, column, cell))
                .collect::<Result<Vec<_>>>()?;
            rows.push(values);
        }

        Self::new(index_name, infer_index(labels), columns, rows)
    }

    /// Encode into the hashed binary envelope.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        let envelope = TableEnvelope {
            version: TABLE_VERSION,
            hash: self.content_hash()?,
            table: self.clone(),
        };
        Ok(serde_cbor::to_vec(&envelope)?)
    }

    /// Decode a binary envelope and verify its hash.
    pub fn from_binary(data: &[u8]) -> Result<Self> {
        let envelope: TableEnvelope = serde_cbor::from_slice(data)?;
        if envelope.version > TABLE_VERSION {
            return Err(TableError::Version(envelope.version));
        }
        if envelope.table.content_hash()? != envelope.hash {
            return Err(TableError::HashMismatch);
        }
        Ok(envelope.table)
    }

    fn content_hash(&self) -> Result<String> {
        let bytes = serde_cbor::to_vec(self)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }
}

/// Parse the timestamp layouts found in scenario tables and listings.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    for layout in [TIMESTAMP_FORMAT, "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts.naive_utc());
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.naive_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

fn infer_index(labels: Vec<String>) -> Vec<IndexValue> {
    if labels.is_empty() {
        return Vec::new();
    }
    if let Some(times) = labels
        .iter()
        .map(|label| parse_timestamp(label))
        .collect::<Option<Vec<_>>>()
    {
        return times.into_iter().map(IndexValue::Time).collect();
    }
    if let Ok(ints) = labels
        .iter()
        .map(|label| label.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
    {
        return ints.into_iter().map(IndexValue::Int).collect();
    }
    labels.into_iter().map(IndexValue::Text).collect()
}

fn parse_value(row: usize, column: usize, cell: &str) -> Result<f64> {
    let cell = cell.trim();
    if cell.is_empty() || cell.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| TableError::Value {
        row,
        column,
        value: cell.to_owned(),
    })
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hourly(n: usize) -> Vec<IndexValue> {
        let start = parse_timestamp("2016-01-01 00:00:00").unwrap();
        (0..n)
            .map(|h| IndexValue::Time(start + chrono::Duration::hours(h as i64)))
            .collect()
    }

    fn sample() -> Table {
        Table::new(
            Some("UTC".into()),
            hourly(3),
            vec![ColumnKey::Int(101), ColumnKey::Int(102)],
            vec![vec![1.0, 2.5], vec![f64::NAN, 4.0], vec![5.0, -6.25]],
        )
        .unwrap()
    }

    #[test]
    fn text_encoding_keeps_labels_and_missing_values() {
        let table = sample();
        let text = String::from_utf8(table.to_csv().unwrap()).unwrap();
        assert!(text.starts_with("UTC,101,102\n2016-01-01 00:00:00,1,2.5\n"));
        assert!(text.contains("2016-01-01 01:00:00,,4\n"));

        let decoded = Table::from_csv(text.as_bytes(), ColumnTyping::Integer).unwrap();
        assert_eq!(decoded, table);
    }

    #[test]
    fn flexibility_profiles_keep_text_columns() {
        let csv = b"UTC,zone_a,zone_b\n2016-01-01 00:00:00,1,2\n";
        let typing = ColumnTyping::for_path("raw/usa_tamu/demand_flexibility_up_vJan2021.csv");
        let table = Table::from_csv(csv, typing).unwrap();
        assert_eq!(table.columns()[0], ColumnKey::Text("zone_a".into()));

        let err = Table::from_csv(csv, ColumnTyping::Integer).unwrap_err();
        assert!(matches!(err, TableError::ColumnLabel(label) if label == "zone_a"));
    }

    #[test]
    fn non_time_labels_fall_back_to_integers_then_text() {
        let table = Table::from_csv(b"plant_id,1\n7,0.5\n9,1.5\n", ColumnTyping::Integer).unwrap();
        assert_eq!(table.index(), &[IndexValue::Int(7), IndexValue::Int(9)]);

        let table = Table::from_csv(b",1\ncoal,0.5\n", ColumnTyping::Integer).unwrap();
        assert_eq!(table.index(), &[IndexValue::Text("coal".into())]);
        assert_eq!(table.index_name(), None);
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let err = Table::new(
            None,
            vec![IndexValue::Int(0)],
            vec![ColumnKey::Int(1), ColumnKey::Int(2)],
            vec![vec![1.0]],
        )
        .unwrap_err();
        assert!(matches!(err, TableError::Shape { expected: 2, found: 1, .. }));
    }

    #[test]
    fn binary_envelope_detects_tampering() {
        let table = sample();
        let bytes = table.to_binary().unwrap();
        assert_eq!(Table::from_binary(&bytes).unwrap(), table);

        assert!(Table::from_binary(&bytes[..bytes.len() / 2]).is_err());
    }

    #[test]
    fn scaling_only_touches_rows_in_window() {
        let mut table = sample();
        let start = parse_timestamp("2016-01-01 01:00:00").unwrap();
        let end = parse_timestamp("2016-01-01 02:00:00").unwrap();
        assert_eq!(table.scale_rows_between(start, end, 0.5), 2);
        assert_eq!(table.row(0), &[1.0, 2.5]);
        assert_eq!(table.row(2), &[2.5, -3.125]);
    }

    #[test]
    fn timestamps_accept_common_layouts() {
        let expected = parse_timestamp("2016-01-01 00:00:00").unwrap();
        assert_eq!(parse_timestamp("2016-01-01"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-01T00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2016-01-01 00:00:00+00:00"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }
}
