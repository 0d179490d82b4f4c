//! Binary classification scores (class 1 is the positive class)

use crate::core::ClassificationMetric;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Confusion {
    tp: usize,
    fp: usize,
    fn_: usize,
    tn: usize,
}

fn confusion(y_true: &[f64], y_pred: &[f64]) -> Confusion {
    let mut c = Confusion::default();
    for (&t, &p) in y_true.iter().zip(y_pred) {
        match (t == 1.0, p == 1.0) {
            (true, true) => c.tp += 1,
            (false, true) => c.fp += 1,
            (true, false) => c.fn_ += 1,
            (false, false) => c.tn += 1,
        }
    }
    c
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

pub fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let c = confusion(y_true, y_pred);
    ratio(c.tp + c.tn, c.tp + c.tn + c.fp + c.fn_)
}

pub fn precision(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let c = confusion(y_true, y_pred);
    ratio(c.tp, c.tp + c.fp)
}

pub fn recall(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let c = confusion(y_true, y_pred);
    ratio(c.tp, c.tp + c.fn_)
}

/// Harmonic mean of precision and recall; 0 when both are 0
pub fn f1(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let c = confusion(y_true, y_pred);
    ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_)
}

pub fn classification_metric(y_true: &[f64], y_pred: &[f64]) -> ClassificationMetric {
    ClassificationMetric {
        precision: precision(y_true, y_pred),
        recall: recall(y_true, y_pred),
        f1: f1(y_true, y_pred),
    }
}
