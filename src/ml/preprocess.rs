//! Column-wise preprocessing
//!
//! A [`Preprocessor`] is fitted once on training rows and then only applied.
//! All learned parameters (categories, power-transform lambdas, means and
//! standard deviations) live in plain serializable blocks.

use crate::data::{Cell, Matrix, Table};
use crate::ml::{MlError, MlResult};
use serde::{Deserialize, Serialize};

/// Schema column groups, one per transform
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureGroups {
    pub one_hot: Vec<String>,
    pub ordinal: Vec<String>,
    pub power: Vec<String>,
    pub scaled: Vec<String>,
}

/// Fitted transform of one input column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnBlock {
    /// One output per known category; unknown and missing values encode as all zeros
    OneHot {
        column: String,
        categories: Vec<String>,
    },
    /// Index of the category in sorted order; unknown and missing values encode as -1
    Ordinal {
        column: String,
        categories: Vec<String>,
    },
    /// Yeo-Johnson followed by standardization
    PowerTransform {
        column: String,
        lambda: f64,
        mean: f64,
        std: f64,
    },
    StandardScale { column: String, mean: f64, std: f64 },
}

impl ColumnBlock {
    fn column(&self) -> &str {
        match self {
            ColumnBlock::OneHot { column, .. }
            | ColumnBlock::Ordinal { column, .. }
            | ColumnBlock::PowerTransform { column, .. }
            | ColumnBlock::StandardScale { column, .. } => column,
        }
    }

    fn width(&self) -> usize {
        match self {
            ColumnBlock::OneHot { categories, .. } => categories.len(),
            _ => 1,
        }
    }

    fn output_names(&self) -> Vec<String> {
        match self {
            ColumnBlock::OneHot { column, categories } => categories
                .iter()
                .map(|c| format!("{}_{}", column, c))
                .collect(),
            ColumnBlock::Ordinal { column, .. } => vec![column.clone()],
            ColumnBlock::PowerTransform { column, .. } => vec![format!("{}_yj", column)],
            ColumnBlock::StandardScale { column, .. } => vec![column.clone()],
        }
    }

    fn apply(&self, cell: &Cell, out: &mut Vec<f64>) -> MlResult<()> {
        match self {
            ColumnBlock::OneHot { categories, .. } => {
                let key = cell.category();
                out.extend(
                    categories
                        .iter()
                        .map(|c| if key.as_deref() == Some(c) { 1.0 } else { 0.0 }),
                );
            }
            ColumnBlock::Ordinal { categories, .. } => {
                let index = cell
                    .category()
                    .and_then(|k| categories.binary_search(&k).ok())
                    .map(|i| i as f64)
                    .unwrap_or(-1.0);
                out.push(index);
            }
            ColumnBlock::PowerTransform {
                column,
                lambda,
                mean,
                std,
            } => {
                let value = match numeric(column, cell)? {
                    Some(v) => (yeo_johnson(v, *lambda) - mean) / std,
                    None => 0.0,
                };
                out.push(value);
            }
            ColumnBlock::StandardScale { column, mean, std } => {
                let value = match numeric(column, cell)? {
                    Some(v) => (v - mean) / std,
                    None => 0.0,
                };
                out.push(value);
            }
        }
        Ok(())
    }
}

/// Composite column transformer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessor {
    blocks: Vec<ColumnBlock>,
}

impl Preprocessor {
    /// Learn every block from `table`
    ///
    /// A column may appear in more than one group; each group then
    /// contributes its own output columns.
    pub fn fit(table: &Table, groups: &FeatureGroups) -> MlResult<Self> {
        if table.is_empty() {
            return Err(MlError::EmptyInput);
        }
        let mut blocks = Vec::new();

        for column in &groups.one_hot {
            blocks.push(ColumnBlock::OneHot {
                column: column.clone(),
                categories: categories(table, column)?,
            });
        }
        for column in &groups.ordinal {
            blocks.push(ColumnBlock::Ordinal {
                column: column.clone(),
                categories: categories(table, column)?,
            });
        }
        for column in &groups.power {
            let values = numeric_values(table, column)?;
            let lambda = fit_yeo_johnson(&values);
            let transformed: Vec<f64> = values.iter().map(|&v| yeo_johnson(v, lambda)).collect();
            let (mean, std) = mean_std(&transformed);
            blocks.push(ColumnBlock::PowerTransform {
                column: column.clone(),
                lambda,
                mean,
                std,
            });
        }
        for column in &groups.scaled {
            let (mean, std) = mean_std(&numeric_values(table, column)?);
            blocks.push(ColumnBlock::StandardScale {
                column: column.clone(),
                mean,
                std,
            });
        }

        Ok(Self { blocks })
    }

    /// Apply the fitted blocks; nothing is re-learned
    pub fn transform(&self, table: &Table) -> MlResult<Matrix> {
        let indices = self
            .blocks
            .iter()
            .map(|b| {
                table
                    .column_index(b.column())
                    .ok_or_else(|| MlError::MissingColumn(b.column().to_string()))
            })
            .collect::<MlResult<Vec<_>>>()?;

        let width = self.n_features_out();
        let mut data = Vec::with_capacity(table.n_rows() * width);
        for row in table.rows() {
            for (block, &idx) in self.blocks.iter().zip(&indices) {
                block.apply(&row[idx], &mut data)?;
            }
        }
        let actual = data.len();
        Matrix::from_vec(table.n_rows(), width, data).map_err(|_| MlError::DimensionMismatch {
            expected: table.n_rows() * width,
            actual,
        })
    }

    pub fn n_features_out(&self) -> usize {
        self.blocks.iter().map(ColumnBlock::width).sum()
    }

    pub fn feature_names(&self) -> Vec<String> {
        self.blocks.iter().flat_map(ColumnBlock::output_names).collect()
    }

    pub fn blocks(&self) -> &[ColumnBlock] {
        &self.blocks
    }
}

fn numeric(column: &str, cell: &Cell) -> MlResult<Option<f64>> {
    match cell {
        Cell::Missing => Ok(None),
        other => other.as_f64().map(Some).ok_or_else(|| MlError::NonNumeric {
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}

fn numeric_values(table: &Table, column: &str) -> MlResult<Vec<f64>> {
    let cells = table
        .column(column)
        .ok_or_else(|| MlError::MissingColumn(column.to_string()))?;
    let mut values = Vec::new();
    for cell in cells {
        if let Some(v) = numeric(column, cell)? {
            values.push(v);
        }
    }
    if values.is_empty() {
        return Err(MlError::EmptyInput);
    }
    Ok(values)
}

fn categories(table: &Table, column: &str) -> MlResult<Vec<String>> {
    let cells = table
        .column(column)
        .ok_or_else(|| MlError::MissingColumn(column.to_string()))?;
    let mut categories: Vec<String> = cells.filter_map(Cell::category).collect();
    categories.sort();
    categories.dedup();
    Ok(categories)
}

/// Population mean and standard deviation; a constant column gets std 1
fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std = var.sqrt();
    if std > f64::EPSILON && std.is_finite() {
        (mean, std)
    } else {
        (mean, 1.0)
    }
}

/// Yeo-Johnson transform of one value
pub fn yeo_johnson(y: f64, lambda: f64) -> f64 {
    const EPS: f64 = 1e-10;
    if y >= 0.0 {
        if lambda.abs() < EPS {
            y.ln_1p()
        } else {
            ((y + 1.0).powf(lambda) - 1.0) / lambda
        }
    } else if (lambda - 2.0).abs() < EPS {
        -(-y).ln_1p()
    } else {
        -((-y + 1.0).powf(2.0 - lambda) - 1.0) / (2.0 - lambda)
    }
}

fn yeo_johnson_log_likelihood(values: &[f64], lambda: f64) -> f64 {
    let n = values.len() as f64;
    let transformed: Vec<f64> = values.iter().map(|&v| yeo_johnson(v, lambda)).collect();
    let mean = transformed.iter().sum::<f64>() / n;
    let var = transformed.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / n;
    if !(var > 0.0) || !var.is_finite() {
        return f64::NEG_INFINITY;
    }
    let jacobian: f64 = values.iter().map(|v| v.signum() * v.abs().ln_1p()).sum();
    -0.5 * n * var.ln() + (lambda - 1.0) * jacobian
}

/// Maximum-likelihood lambda by golden-section search on [-3, 3]
fn fit_yeo_johnson(values: &[f64]) -> f64 {
    let phi = (5f64.sqrt() - 1.0) / 2.0;
    let (mut lo, mut hi) = (-3.0f64, 3.0f64);
    let mut a = hi - phi * (hi - lo);
    let mut b = lo + phi * (hi - lo);
    let mut fa = yeo_johnson_log_likelihood(values, a);
    let mut fb = yeo_johnson_log_likelihood(values, b);

    while hi - lo > 1e-6 {
        if fa < fb {
            lo = a;
            a = b;
            fa = fb;
            b = lo + phi * (hi - lo);
            fb = yeo_johnson_log_likelihood(values, b);
        } else {
            hi = b;
            b = a;
            fb = fa;
            a = hi - phi * (hi - lo);
            fa = yeo_johnson_log_likelihood(values, a);
        }
    }
    let lambda = (lo + hi) / 2.0;
    if lambda.is_finite() {
        lambda
    } else {
        1.0
    }
}
