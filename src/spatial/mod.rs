pub mod density;
pub mod intensity;
pub mod pattern;
pub mod window;

pub use density::{
    DensityField, DensityOptions, GaussianSmoother, GridSpec, Smoother, append_density_column,
    compute_density_field, default_bandwidth,
};
pub use intensity::{append_intensity_column, compute_intensity};
pub use pattern::{Point, PointPattern};
pub use window::{Bounds, Window};
