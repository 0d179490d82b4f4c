//! The fixed two-way label mapping
//!
//! Defined once here and used by transformation, evaluation and serving so
//! the encoding cannot differ between stages.

use serde::{Deserialize, Serialize};

/// Encoding of `case_status` values to class indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetMapping {
    pub certified: u8,
    pub denied: u8,
}

/// The one mapping the pipeline uses
pub const TARGET_MAPPING: TargetMapping = TargetMapping {
    certified: 0,
    denied: 1,
};

impl TargetMapping {
    /// Class index of a raw label, `None` for anything else
    pub fn encode(&self, label: &str) -> Option<f64> {
        match label.trim() {
            "Certified" => Some(self.certified as f64),
            "Denied" => Some(self.denied as f64),
            _ => None,
        }
    }

    /// Raw label of a class index
    pub fn decode(&self, class: f64) -> Option<&'static str> {
        match class_index(class)? {
            c if c == self.certified => Some("Certified"),
            c if c == self.denied => Some("Denied"),
            _ => None,
        }
    }

    /// Label shown to users of the prediction endpoint; follows the encoding, so
    /// class 0 (Certified) reads "Approved"
    pub fn human_label(&self, class: f64) -> Option<&'static str> {
        match class_index(class)? {
            c if c == self.certified => Some("Approved"),
            c if c == self.denied => Some("Denied"),
            _ => None,
        }
    }
}

fn class_index(class: f64) -> Option<u8> {
    if class.fract() == 0.0 && (0.0..=u8::MAX as f64).contains(&class) {
        Some(class as u8)
    } else {
        None
    }
}
