//! Dense f64 matrices and their `.npy` encoding
//!
//! Only the subset of the NumPy format the pipeline writes is supported:
//! version 1.0, little-endian `<f8`, C order, two dimensions.

use regex::Regex;
use std::io::{self, Read, Write};
use std::path::Path;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGN: usize = 64;

/// Row-major matrix of f64
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    /// Build from a flat row-major buffer
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> io::Result<Self> {
        if data.len() != rows * cols {
            return Err(invalid(format!(
                "buffer of {} values does not fit shape ({}, {})",
                data.len(),
                rows,
                cols
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from rows of equal width
    pub fn from_rows(rows: &[Vec<f64>]) -> io::Result<Self> {
        let cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            if row.len() != cols {
                return Err(invalid("ragged rows".to_string()));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            rows: rows.len(),
            cols,
            data,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact(0) panics, and a zero-width matrix has no meaningful rows anyway
        self.data.chunks_exact(self.cols.max(1)).take(self.rows)
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.cols + j]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Append `values` as an extra last column
    pub fn with_column(&self, values: &[f64]) -> io::Result<Matrix> {
        if values.len() != self.rows {
            return Err(invalid(format!(
                "column of {} values for {} rows",
                values.len(),
                self.rows
            )));
        }
        let mut data = Vec::with_capacity(self.rows * (self.cols + 1));
        for (i, value) in values.iter().enumerate() {
            data.extend_from_slice(self.row(i));
            data.push(*value);
        }
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols + 1,
            data,
        })
    }

    /// Split off the last column: (features, labels)
    pub fn split_last_column(&self) -> io::Result<(Matrix, Vec<f64>)> {
        if self.cols == 0 {
            return Err(invalid("cannot split a matrix with no columns".to_string()));
        }
        let width = self.cols - 1;
        let mut features = Vec::with_capacity(self.rows * width);
        let mut labels = Vec::with_capacity(self.rows);
        for i in 0..self.rows {
            let row = self.row(i);
            features.extend_from_slice(&row[..width]);
            labels.push(row[width]);
        }
        Ok((
            Matrix {
                rows: self.rows,
                cols: width,
                data: features,
            },
            labels,
        ))
    }

    /// Copy of the rows at `indices`
    pub fn select_rows(&self, indices: &[usize]) -> Matrix {
        let mut data = Vec::with_capacity(indices.len() * self.cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Matrix {
            rows: indices.len(),
            cols: self.cols,
            data,
        }
    }

    /// Encode as `.npy`
    pub fn write_npy<W: Write>(&self, mut writer: W) -> io::Result<()> {
        let dict = format!(
            "{{'descr': '<f8', 'fortran_order': False, 'shape': ({}, {}), }}",
            self.rows, self.cols
        );
        // magic + version + u16 length + dict + padding + newline
        let unpadded = MAGIC.len() + 2 + 2 + dict.len() + 1;
        let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
        let header_len = dict.len() + padding + 1;
        let header_len = u16::try_from(header_len)
            .map_err(|_| invalid("npy header too long".to_string()))?;

        writer.write_all(MAGIC)?;
        writer.write_all(&[1, 0])?;
        writer.write_all(&header_len.to_le_bytes())?;
        writer.write_all(dict.as_bytes())?;
        writer.write_all(&vec![b' '; padding])?;
        writer.write_all(b"\n")?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer.flush()
    }

    /// Decode from `.npy`
    pub fn read_npy<R: Read>(mut reader: R) -> io::Result<Matrix> {
        let mut preamble = [0u8; 10];
        reader.read_exact(&mut preamble)?;
        if &preamble[..6] != MAGIC {
            return Err(invalid("not an npy file".to_string()));
        }
        if preamble[6] != 1 {
            return Err(invalid(format!(
                "unsupported npy version {}.{}",
                preamble[6], preamble[7]
            )));
        }
        let header_len = u16::from_le_bytes([preamble[8], preamble[9]]) as usize;
        let mut header = vec![0u8; header_len];
        reader.read_exact(&mut header)?;
        let header = String::from_utf8(header).map_err(|e| invalid(e.to_string()))?;

        let (rows, cols) = parse_header(&header)?;
        let n_bytes = rows
            .checked_mul(cols)
            .and_then(|n| n.checked_mul(8))
            .ok_or_else(|| invalid(format!("shape ({}, {}) is too large", rows, cols)))?;

        // The buffer grows with the bytes actually present, not the declared shape
        let mut body = Vec::new();
        reader.by_ref().take(n_bytes as u64).read_to_end(&mut body)?;
        if body.len() != n_bytes {
            return Err(invalid(format!(
                "npy body holds {} bytes, shape ({}, {}) needs {}",
                body.len(),
                rows,
                cols,
                n_bytes
            )));
        }
        let data = body
            .chunks_exact(8)
            .map(|chunk| {
                let mut buf = [0u8; 8];
                buf.copy_from_slice(chunk);
                f64::from_le_bytes(buf)
            })
            .collect();
        Ok(Matrix { rows, cols, data })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let file = crate::core::create_new_file(path.as_ref())?;
        self.write_npy(io::BufWriter::new(file))
    }

    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Matrix> {
        let file = std::fs::File::open(path)?;
        Self::read_npy(io::BufReader::new(file))
    }
}

fn parse_header(header: &str) -> io::Result<(usize, usize)> {
    let descr = Regex::new(r"'descr':\s*'([^']+)'").map_err(|e| invalid(e.to_string()))?;
    let order = Regex::new(r"'fortran_order':\s*(True|False)").map_err(|e| invalid(e.to_string()))?;
    let shape = Regex::new(r"'shape':\s*\((\d+),\s*(\d+),?\s*\)").map_err(|e| invalid(e.to_string()))?;

    match descr.captures(header).and_then(|c| c.get(1)) {
        Some(m) if m.as_str() == "<f8" => {}
        Some(m) => return Err(invalid(format!("unsupported dtype {}", m.as_str()))),
        None => return Err(invalid("npy header has no descr".to_string())),
    }
    if let Some(c) = order.captures(header) {
        if &c[1] == "True" {
            return Err(invalid("fortran-ordered arrays are not supported".to_string()));
        }
    }
    let caps = shape
        .captures(header)
        .ok_or_else(|| invalid("npy header has no 2-d shape".to_string()))?;
    let rows = caps[1].parse().map_err(|_| invalid("bad row count".to_string()))?;
    let cols = caps[2].parse().map_err(|_| invalid("bad column count".to_string()))?;
    Ok((rows, cols))
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}
