pub mod range;
pub mod series;

pub use range::Range;
pub use series::{MetricPoint, Series};
