//! Tabular data, numeric arrays and label encoding

pub mod table;
pub mod target;
pub mod tensor;

pub use table::{Cell, Table};
pub use target::{TargetMapping, TARGET_MAPPING};
pub use tensor::Matrix;
