//! Variance-stabilized expression for visualization and PCA

mod vst;

pub use vst::{transform_value, vst, VstResult};
