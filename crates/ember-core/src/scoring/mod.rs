//! Priority Scoring and Layer Classification
//!
//! Pure, synchronous ranking machinery:
//! - [`PriorityScorer`] maps a knowledge item to a cache priority in [0,1]
//! - [`LayerClassifier`] maps a knowledge item to its cache layer
//!
//! Both are mode-parameterized at construction and side-effect-free, so
//! classify-then-rescore always reproduces the same `(layer, priority)`
//! pair.

mod classifier;
mod scorer;

pub use classifier::LayerClassifier;
pub use scorer::{PriorityScorer, ScoringMode, strategic_value, type_weight};
