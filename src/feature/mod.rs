mod function;
mod list;

pub use function::FeatureFunction;
pub use list::{FeatureList, Iter, SortMode};

/// A single component of a sparse vector: a feature index and its activation factor
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Feature {
    pub index: usize,
    pub factor: f64,
}

impl Feature {
    pub fn new(index: usize, factor: f64) -> Self {
        Self { index, factor }
    }
}
