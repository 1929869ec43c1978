//! ---
//! psd_section: "04-data-access"
//! psd_subsection: "module"
//! psd_type: "source"
//! psd_scope: "code"
//! psd_description: "MATLAB level 4 container of named double matrices."
//! psd_version: "v0.1.0"
//! psd_owner: "tbd"
//! ---
use indexmap::IndexMap;

/// Header length of one level 4 variable: five little-endian `i32`.
const HEADER_LEN: usize = 20;

/// Type code for a little-endian, full, real double matrix.
const TYPE_LE_DOUBLE: i32 = 0;

/// Errors raised while building or decoding MATLAB containers.
#[derive(Debug, thiserror::Error)]
pub enum MatError {
    /// Variable names must be non-empty ASCII without NUL bytes.
    #[error("invalid variable name '{0}'")]
    Name(String),
    /// Data length does not match the declared dimensions.
    #[error("variable {name} declares {rows}x{cols} but holds {len} values")]
    Dimensions {
        /// Variable name.
        name: String,
        /// Declared rows.
        rows: usize,
        /// Declared columns.
        cols: usize,
        /// Supplied values.
        len: usize,
    },
    /// The container ended in the middle of a variable.
    #[error("container truncated at byte {0}")]
    Truncated(usize),
    /// The variable uses a layout other than little-endian real doubles.
    #[error("unsupported matrix type {0}")]
    UnsupportedType(i32),
}

type Result<T> = std::result::Result<T, MatError>;

/// Real double matrix stored column-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MatMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl MatMatrix {
    /// Matrix from column-major data.
    pub fn from_column_major(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows * cols != data.len() {
            return Err(MatError::Dimensions {
                name: String::new(),
                rows,
                cols,
                len: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Matrix from a list of equally long rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|row| row.len() != cols) {
            return Err(MatError::Dimensions {
                name: String::new(),
                rows: rows.len(),
                cols,
                len: bad.len(),
            });
        }
        let mut data = Vec::with_capacity(rows.len() * cols);
        for col in 0..cols {
            data.extend(rows.iter().map(|row| row[col]));
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    /// Column vector.
    pub fn column(values: Vec<f64>) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values,
        }
    }

    /// Scalar stored as a 1x1 matrix.
    pub fn scalar(value: f64) -> Self {
        Self::column(vec![value])
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Single element.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }

    /// Column-major data.
    pub fn data(&self) -> &[f64] {
        &self.data
    }
}

/// Ordered collection of named matrices, as written to a `.mat` file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatFile {
    variables: IndexMap<String, MatMatrix>,
}

impl MatFile {
    /// Empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable.
    pub fn insert(&mut self, name: impl Into<String>, matrix: MatMatrix) -> Result<&mut Self> {
        let name = name.into();
        if name.is_empty() || !name.is_ascii() || name.contains('\0') {
            return Err(MatError::Name(name));
        }
        self.variables.insert(name, matrix);
        Ok(self)
    }

    /// Variable by name.
    pub fn get(&self, name: &str) -> Option<&MatMatrix> {
        self.variables.get(name)
    }

    /// Variable names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether the container holds no variables.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Serialize every variable in insertion order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for (name, matrix) in &self.variables {
            for field in [
                TYPE_LE_DOUBLE,
                matrix.rows as i32,
                matrix.cols as i32,
                0,
                name.len() as i32 + 1,
            ] {
                out.extend_from_slice(&field.to_le_bytes());
            }
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            for value in &matrix.data {
                out.extend_from_slice(&value.to_le_bytes());
            }
        }
        out
    }

    /// Parse a container holding little-endian real double matrices.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut file = MatFile::new();
        let mut offset = 0;
        while offset < bytes.len() {
            let header = take(bytes, offset, HEADER_LEN)?;
            let field = |i: usize| {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&header[i * 4..i * 4 + 4]);
                i32::from_le_bytes(raw)
            };
            let (kind, rows, cols, imag, name_len) = (field(0), field(1), field(2), field(3), field(4));
            if kind != TYPE_LE_DOUBLE || imag != 0 || rows < 0 || cols < 0 || name_len < 1 {
                return Err(MatError::UnsupportedType(kind));
            }
            offset += HEADER_LEN;

            let raw_name = take(bytes, offset, name_len as usize)?;
            let name = String::from_utf8_lossy(&raw_name[..raw_name.len() - 1]).into_owned();
            offset += name_len as usize;

            let (rows, cols) = (rows as usize, cols as usize);
            let raw = take(bytes, offset, rows * cols * 8)?;
            let data = raw
                .chunks_exact(8)
                .map(|chunk| {
                    let mut value = [0u8; 8];
                    value.copy_from_slice(chunk);
                    f64::from_le_bytes(value)
                })
                .collect();
            offset += rows * cols * 8;

            file.insert(name, MatMatrix { rows, cols, data })?;
        }
        Ok(file)
    }
}

fn take(bytes: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    bytes
        .get(offset..offset + len)
        .ok_or(MatError::Truncated(bytes.len()))
}
