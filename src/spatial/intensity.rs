use crate::error::PpaError;
use crate::spatial::pattern::PointPattern;
use crate::table::{Column, SampleCollection};

/// Points per unit area. An empty pattern has intensity exactly 0.
pub fn compute_intensity(pattern: &PointPattern) -> f64 {
    if pattern.is_empty() {
        return 0.0;
    }
    pattern.len() as f64 / pattern.window().area()
}

/// Appends `column` holding the intensity of every row's `pattern`.
pub fn append_intensity_column(
    collection: &mut SampleCollection,
    pattern: &str,
    column: &str,
) -> Result<(), PpaError> {
    let values = collection
        .patterns(pattern)?
        .iter()
        .map(|pp| Some(compute_intensity(pp)))
        .collect();
    collection.append_column(column, Column::Scalar(values))
}
