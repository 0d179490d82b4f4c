//! Distribution drift between the train and test partitions

use crate::core::{ColumnKind, SchemaConfig, ValidationConfig};
use crate::data::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-feature drift result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    pub column: String,
    /// Name of the statistical test used
    pub test: String,
    pub statistic: f64,
    pub p_value: f64,
    pub threshold: f64,
    pub drifted: bool,
}

/// Dataset-level drift summary, persisted as YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub features: Vec<FeatureDrift>,
    pub drifted_feature_count: usize,
    pub drifted_features: Vec<String>,
    pub drifted_share: f64,
    pub drift_share_threshold: f64,
    pub dataset_drift: bool,
}

impl DriftReport {
    /// Aggregate feature results against the dataset-level share threshold
    pub fn from_features(features: Vec<FeatureDrift>, drift_share: f64) -> Self {
        let drifted_features: Vec<String> = features
            .iter()
            .filter(|f| f.drifted)
            .map(|f| f.column.clone())
            .collect();
        let drifted_share = if features.is_empty() {
            0.0
        } else {
            drifted_features.len() as f64 / features.len() as f64
        };
        Self {
            drifted_feature_count: drifted_features.len(),
            dataset_drift: !features.is_empty() && drifted_share >= drift_share,
            drifted_features,
            drifted_share,
            drift_share_threshold: drift_share,
            features,
        }
    }
}

/// Computes drift between a reference and a current table
pub trait DriftDetector: Send + Sync {
    fn detect(
        &self,
        reference: &Table,
        current: &Table,
        schema: &SchemaConfig,
        settings: &ValidationConfig,
    ) -> DriftReport;
}

/// Kolmogorov-Smirnov for numeric columns, chi-square for categorical ones
#[derive(Debug, Clone, Copy, Default)]
pub struct StatisticalDriftDetector;

impl DriftDetector for StatisticalDriftDetector {
    fn detect(
        &self,
        reference: &Table,
        current: &Table,
        schema: &SchemaConfig,
        settings: &ValidationConfig,
    ) -> DriftReport {
        let mut features = Vec::new();
        for spec in &schema.columns {
            let (Some(ref_cells), Some(cur_cells)) = (reference.column(&spec.name), current.column(&spec.name)) else {
                continue;
            };
            let result = match spec.kind {
                ColumnKind::Numeric => {
                    let a: Vec<f64> = ref_cells.filter_map(|c| c.as_f64()).collect();
                    let b: Vec<f64> = cur_cells.filter_map(|c| c.as_f64()).collect();
                    ks_test(&a, &b).map(|(d, p)| ("ks", d, p))
                }
                ColumnKind::Categorical => {
                    let a: Vec<String> = ref_cells.filter_map(|c| c.category()).collect();
                    let b: Vec<String> = cur_cells.filter_map(|c| c.category()).collect();
                    chi_square_test(&a, &b).map(|(s, p)| ("chi_square", s, p))
                }
            };
            if let Some((test, statistic, p_value)) = result {
                features.push(FeatureDrift {
                    column: spec.name.clone(),
                    test: test.to_string(),
                    statistic,
                    p_value,
                    threshold: settings.p_value_threshold,
                    drifted: p_value < settings.p_value_threshold,
                });
            }
        }
        DriftReport::from_features(features, settings.drift_share)
    }
}

/// Two-sample Kolmogorov-Smirnov statistic and asymptotic p-value
pub fn ks_test(a: &[f64], b: &[f64]) -> Option<(f64, f64)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut a = a.to_vec();
    let mut b = b.to_vec();
    a.sort_by(f64::total_cmp);
    b.sort_by(f64::total_cmp);

    let (n, m) = (a.len(), b.len());
    let (mut i, mut j) = (0, 0);
    let mut d: f64 = 0.0;
    while i < n && j < m {
        let x = a[i].min(b[j]);
        while i < n && a[i] <= x {
            i += 1;
        }
        while j < m && b[j] <= x {
            j += 1;
        }
        d = d.max((i as f64 / n as f64 - j as f64 / m as f64).abs());
    }

    let en = ((n * m) as f64 / (n + m) as f64).sqrt();
    let p = kolmogorov_q((en + 0.12 + 0.11 / en) * d);
    Some((d, p))
}

/// Survival function of the Kolmogorov distribution
fn kolmogorov_q(lambda: f64) -> f64 {
    if lambda < 1e-3 {
        return 1.0;
    }
    let mut sum = 0.0;
    let mut sign = 1.0;
    for k in 1..=100 {
        let term = sign * (-2.0 * (k as f64).powi(2) * lambda * lambda).exp();
        sum += term;
        if term.abs() < 1e-12 {
            break;
        }
        sign = -sign;
    }
    (2.0 * sum).clamp(0.0, 1.0)
}

/// Chi-square homogeneity test over the categories of two samples
pub fn chi_square_test(a: &[String], b: &[String]) -> Option<(f64, f64)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }
    let mut counts: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for v in a {
        counts.entry(v.as_str()).or_default().0 += 1.0;
    }
    for v in b {
        counts.entry(v.as_str()).or_default().1 += 1.0;
    }
    if counts.len() < 2 {
        return Some((0.0, 1.0));
    }

    let (na, nb) = (a.len() as f64, b.len() as f64);
    let total = na + nb;
    let mut statistic = 0.0;
    for (ca, cb) in counts.values() {
        let col = ca + cb;
        for (observed, row_total) in [(ca, na), (cb, nb)] {
            let expected = row_total * col / total;
            if expected > 0.0 {
                statistic += (observed - expected).powi(2) / expected;
            }
        }
    }
    let dof = (counts.len() - 1) as f64;
    Some((statistic, upper_regularized_gamma(dof / 2.0, statistic / 2.0)))
}

fn ln_gamma(x: f64) -> f64 {
    // Lanczos approximation, g = 7
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let mut a = COEF[0];
    let t = x + 7.5;
    for (i, c) in COEF.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Q(s, x) = Γ(s, x) / Γ(s)
fn upper_regularized_gamma(s: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    let ln_prefix = s * x.ln() - x - ln_gamma(s);
    if x < s + 1.0 {
        // series for the lower function
        let mut term = 1.0 / s;
        let mut sum = term;
        let mut k = s;
        for _ in 0..500 {
            k += 1.0;
            term *= x / k;
            sum += term;
            if term.abs() < sum.abs() * 1e-15 {
                break;
            }
        }
        (1.0 - sum * ln_prefix.exp()).clamp(0.0, 1.0)
    } else {
        // Lentz continued fraction for the upper function
        let tiny = 1e-300;
        let mut b = x + 1.0 - s;
        let mut c = 1.0 / tiny;
        let mut d = 1.0 / b;
        let mut h = d;
        for i in 1..500 {
            let an = -(i as f64) * (i as f64 - s);
            b += 2.0;
            d = an * d + b;
            if d.abs() < tiny {
                d = tiny;
            }
            c = b + an / c;
            if c.abs() < tiny {
                c = tiny;
            }
            d = 1.0 / d;
            let delta = d * c;
            h *= delta;
            if (delta - 1.0).abs() < 1e-15 {
                break;
            }
        }
        (ln_prefix.exp() * h).clamp(0.0, 1.0)
    }
}
