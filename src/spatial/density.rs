//! Kernel-smoothed intensity surfaces.
//!
//! A density field is a regular grid laid over the bounding box of a
//! pattern's window. Cells whose centre falls outside the window carry no
//! value. Bandwidth is the standard deviation of an isotropic Gaussian
//! kernel; larger values trade spatial resolution for lower noise.

use std::f64::consts::{PI, SQRT_2};

#[cfg(feature = "mt")]
use rayon::prelude::*;
use statrs::function::erf::erfc;

use crate::config::{AnalysisConfig, EdgeCorrection};
use crate::error::PpaError;
use crate::spatial::pattern::PointPattern;
use crate::spatial::window::{Bounds, Window};
use crate::table::{Column, SampleCollection};

/// Kernel contributions beyond this many bandwidths are dropped.
const KERNEL_CUTOFF: f64 = 6.0;
const MIN_EDGE_MASS: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub nx: usize,
    pub ny: usize,
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
}

impl GridSpec {
    pub fn covering(window: &Window, resolution: usize) -> Self {
        let b = window.bounds();
        let n = resolution.max(1);
        Self {
            nx: n,
            ny: n,
            x0: b.xmin,
            y0: b.ymin,
            dx: b.width() / n as f64,
            dy: b.height() / n as f64,
        }
    }

    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell_area(&self) -> f64 {
        self.dx * self.dy
    }

    pub fn center(&self, i: usize, j: usize) -> (f64, f64) {
        (
            self.x0 + (i as f64 + 0.5) * self.dx,
            self.y0 + (j as f64 + 0.5) * self.dy,
        )
    }

    pub fn index(&self, i: usize, j: usize) -> usize {
        j * self.nx + i
    }

    /// Whether the grid extent coincides with `bounds` up to rounding.
    pub fn spans(&self, bounds: &Bounds) -> bool {
        let close = |a: f64, b: f64, scale: f64| {
            (a - b).abs() <= 1e-9 * scale.max(a.abs()).max(b.abs()).max(1.0)
        };
        let (w, h) = (bounds.width(), bounds.height());
        close(self.x0, bounds.xmin, w)
            && close(self.x0 + self.nx as f64 * self.dx, bounds.xmax, w)
            && close(self.y0, bounds.ymin, h)
            && close(self.y0 + self.ny as f64 * self.dy, bounds.ymax, h)
    }

    /// Cell holding `(x, y)`, clamped to the grid.
    pub fn cell_of(&self, x: f64, y: f64) -> (usize, usize) {
        let fi = ((x - self.x0) / self.dx).floor();
        let fj = ((y - self.y0) / self.dy).floor();
        (
            fi.clamp(0.0, (self.nx - 1) as f64) as usize,
            fj.clamp(0.0, (self.ny - 1) as f64) as usize,
        )
    }

    fn span(&self, centre: f64, origin: f64, step: f64, radius: f64, n: usize) -> (usize, usize) {
        let lo = ((centre - radius - origin) / step - 0.5).floor().max(0.0) as usize;
        let hi = ((centre + radius - origin) / step - 0.5).ceil();
        let hi = if hi < 0.0 {
            0
        } else {
            (hi as usize).min(n - 1)
        };
        (lo.min(n - 1), hi)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DensityOptions {
    pub resolution: usize,
    pub edge_correction: EdgeCorrection,
}

impl DensityOptions {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            resolution: config.resolution,
            edge_correction: config.edge_correction,
        }
    }
}

impl Default for DensityOptions {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensityField {
    grid: GridSpec,
    values: Vec<Option<f64>>,
    bandwidth: f64,
    edge_correction: EdgeCorrection,
}

impl DensityField {
    pub fn from_parts(
        grid: GridSpec,
        values: Vec<Option<f64>>,
        bandwidth: f64,
        edge_correction: EdgeCorrection,
    ) -> Result<Self, PpaError> {
        if values.len() != grid.len() {
            return Err(PpaError::Column(format!(
                "density field has {} values for a {}x{} grid",
                values.len(),
                grid.nx,
                grid.ny
            )));
        }
        Ok(Self {
            grid,
            values,
            bandwidth,
            edge_correction,
        })
    }

    pub fn grid(&self) -> &GridSpec {
        &self.grid
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn bandwidth(&self) -> f64 {
        self.bandwidth
    }

    pub fn edge_correction(&self) -> EdgeCorrection {
        self.edge_correction
    }

    pub fn cell(&self, i: usize, j: usize) -> Option<f64> {
        if i >= self.grid.nx || j >= self.grid.ny {
            return None;
        }
        self.values[self.grid.index(i, j)]
    }

    pub fn in_window_cells(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// Integral over the window (Riemann sum over in-window cells).
    pub fn integral(&self) -> f64 {
        self.values.iter().flatten().sum::<f64>() * self.grid.cell_area()
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().flatten().copied().reduce(f64::max)
    }

    /// Mean squared difference between 4-neighbour in-window cells.
    pub fn roughness(&self) -> f64 {
        let mut acc = 0.0;
        let mut pairs = 0usize;
        for j in 0..self.grid.ny {
            for i in 0..self.grid.nx {
                let Some(v) = self.cell(i, j) else {
                    continue;
                };
                if let Some(r) = self.cell(i + 1, j) {
                    acc += (v - r) * (v - r);
                    pairs += 1;
                }
                if let Some(u) = self.cell(i, j + 1) {
                    acc += (v - u) * (v - u);
                    pairs += 1;
                }
            }
        }
        if pairs == 0 { 0.0 } else { acc / pairs as f64 }
    }

    /// Bilinear interpolation between cell centres; falls back to the nearest
    /// in-window cell when a neighbour lies outside the window.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let g = &self.grid;
        let fx = (x - g.x0) / g.dx - 0.5;
        let fy = (y - g.y0) / g.dy - 0.5;
        let inner_x = fx >= 0.0 && fx < (g.nx - 1) as f64;
        let inner_y = fy >= 0.0 && fy < (g.ny - 1) as f64;
        if inner_x && inner_y {
            let i0 = fx.floor() as usize;
            let j0 = fy.floor() as usize;
            let corners = (
                self.cell(i0, j0),
                self.cell(i0 + 1, j0),
                self.cell(i0, j0 + 1),
                self.cell(i0 + 1, j0 + 1),
            );
            if let (Some(v00), Some(v10), Some(v01), Some(v11)) = corners {
                let tx = fx - i0 as f64;
                let ty = fy - j0 as f64;
                let bottom = v00 * (1.0 - tx) + v10 * tx;
                let top = v01 * (1.0 - tx) + v11 * tx;
                return Some(bottom * (1.0 - ty) + top * ty);
            }
        }
        self.nearest(x, y)
    }

    fn nearest(&self, x: f64, y: f64) -> Option<f64> {
        let (ci, cj) = self.grid.cell_of(x, y);
        if let Some(v) = self.cell(ci, cj) {
            return Some(v);
        }
        let max_ring = self.grid.nx.max(self.grid.ny);
        for ring in 1..=max_ring {
            let mut best: Option<(f64, f64)> = None;
            let i_lo = ci.saturating_sub(ring);
            let j_lo = cj.saturating_sub(ring);
            for j in j_lo..=(cj + ring).min(self.grid.ny - 1) {
                for i in i_lo..=(ci + ring).min(self.grid.nx - 1) {
                    if i.abs_diff(ci).max(j.abs_diff(cj)) != ring {
                        continue;
                    }
                    if let Some(v) = self.cell(i, j) {
                        let (cx, cy) = self.grid.center(i, j);
                        let d2 = (cx - x).powi(2) + (cy - y).powi(2);
                        if best.is_none_or(|(bd, _)| d2 < bd) {
                            best = Some((d2, v));
                        }
                    }
                }
            }
            if let Some((_, v)) = best {
                return Some(v);
            }
        }
        None
    }
}

/// Kernel smoothing engine.
pub trait Smoother: Send + Sync {
    fn smooth(
        &self,
        pattern: &PointPattern,
        bandwidth: f64,
        options: &DensityOptions,
    ) -> Result<DensityField, PpaError>;
}

/// One eighth of the shortest side of the window's bounding box.
pub fn default_bandwidth(window: &Window) -> f64 {
    window.shortest_side() / 8.0
}

pub fn compute_density_field(
    pattern: &PointPattern,
    bandwidth: f64,
    options: &DensityOptions,
    smoother: &dyn Smoother,
) -> Result<DensityField, PpaError> {
    if !(bandwidth.is_finite() && bandwidth > 0.0) {
        return Err(PpaError::InvalidBandwidth(bandwidth));
    }
    if options.resolution < 2 {
        return Err(PpaError::InvalidConfig(format!(
            "resolution must be >= 2 (got {})",
            options.resolution
        )));
    }
    smoother.smooth(pattern, bandwidth, options)
}

/// Appends `column` holding a density field per row of `pattern`. Rows are
/// smoothed independently (in parallel with the `mt` feature) and joined
/// back by sample ID.
pub fn append_density_column(
    collection: &mut SampleCollection,
    pattern: &str,
    column: &str,
    config: &AnalysisConfig,
    smoother: &dyn Smoother,
) -> Result<(), PpaError> {
    let options = DensityOptions::from_config(config);
    let keyed = {
        let patterns = collection.patterns(pattern)?;
        let jobs: Vec<(&String, &PointPattern)> =
            collection.ids().iter().zip(patterns.iter()).collect();
        let smooth_one = |(id, pp): &(&String, &PointPattern)| {
            let bandwidth = config
                .bandwidth
                .unwrap_or_else(|| default_bandwidth(pp.window()));
            compute_density_field(pp, bandwidth, &options, smoother)
                .map(|field| ((*id).clone(), field))
        };
        run_jobs(&jobs, config.threads, smooth_one)?
    };
    let fields = collection.align_by_id(keyed)?;
    collection.append_column(column, Column::Field(fields))
}

#[cfg(feature = "mt")]
fn run_jobs<J, T, F>(jobs: &[J], threads: usize, f: F) -> Result<Vec<T>, PpaError>
where
    J: Sync,
    T: Send,
    F: Fn(&J) -> Result<T, PpaError> + Sync + Send,
{
    if threads == 0 {
        return jobs.par_iter().map(f).collect();
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| PpaError::InvalidConfig(format!("failed to build thread pool: {}", e)))?;
    pool.install(|| jobs.par_iter().map(f).collect())
}

#[cfg(not(feature = "mt"))]
fn run_jobs<J, T, F>(jobs: &[J], threads: usize, f: F) -> Result<Vec<T>, PpaError>
where
    F: Fn(&J) -> Result<T, PpaError>,
{
    let _ = threads;
    jobs.iter().map(f).collect()
}

/// Isotropic Gaussian kernel evaluated at cell centres.
#[derive(Debug, Clone, Copy, Default)]
pub struct GaussianSmoother;

impl Smoother for GaussianSmoother {
    fn smooth(
        &self,
        pattern: &PointPattern,
        bandwidth: f64,
        options: &DensityOptions,
    ) -> Result<DensityField, PpaError> {
        let window = pattern.window();
        let grid = GridSpec::covering(window, options.resolution);
        let mask: Vec<bool> = (0..grid.ny)
            .flat_map(|j| (0..grid.nx).map(move |i| (i, j)))
            .map(|(i, j)| {
                let (cx, cy) = grid.center(i, j);
                window.contains(cx, cy)
            })
            .collect();
        let kernel = Kernel::new(bandwidth);

        let point_weights: Vec<f64> = match options.edge_correction {
            EdgeCorrection::Diggle => pattern
                .points()
                .iter()
                .map(|p| 1.0 / edge_mass(window, &grid, &mask, &kernel, p.x, p.y))
                .collect(),
            _ => vec![1.0; pattern.len()],
        };

        let mut raw = vec![0.0f64; grid.len()];
        let radius = kernel.radius();
        for (p, w) in pattern.points().iter().zip(point_weights.iter()) {
            let (i_lo, i_hi) = grid.span(p.x, grid.x0, grid.dx, radius, grid.nx);
            let (j_lo, j_hi) = grid.span(p.y, grid.y0, grid.dy, radius, grid.ny);
            for j in j_lo..=j_hi {
                for i in i_lo..=i_hi {
                    let idx = grid.index(i, j);
                    if !mask[idx] {
                        continue;
                    }
                    let (cx, cy) = grid.center(i, j);
                    raw[idx] += w * kernel.eval(cx - p.x, cy - p.y);
                }
            }
        }

        let values = (0..grid.ny)
            .flat_map(|j| (0..grid.nx).map(move |i| (i, j)))
            .map(|(i, j)| {
                let idx = grid.index(i, j);
                if !mask[idx] {
                    return None;
                }
                match options.edge_correction {
                    EdgeCorrection::Uniform => {
                        let (cx, cy) = grid.center(i, j);
                        Some(raw[idx] / edge_mass(window, &grid, &mask, &kernel, cx, cy))
                    }
                    EdgeCorrection::None | EdgeCorrection::Diggle => Some(raw[idx]),
                }
            })
            .collect();

        DensityField::from_parts(grid, values, bandwidth, options.edge_correction)
    }
}

struct Kernel {
    sigma: f64,
    norm: f64,
}

impl Kernel {
    fn new(sigma: f64) -> Self {
        Self {
            sigma,
            norm: 1.0 / (2.0 * PI * sigma * sigma),
        }
    }

    fn radius(&self) -> f64 {
        KERNEL_CUTOFF * self.sigma
    }

    fn eval(&self, dx: f64, dy: f64) -> f64 {
        let d2 = dx * dx + dy * dy;
        if d2 > self.radius() * self.radius() {
            return 0.0;
        }
        self.norm * (-d2 / (2.0 * self.sigma * self.sigma)).exp()
    }
}

fn std_normal_cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Kernel mass centred on `(x, y)` that falls inside the window.
fn edge_mass(
    window: &Window,
    grid: &GridSpec,
    mask: &[bool],
    kernel: &Kernel,
    x: f64,
    y: f64,
) -> f64 {
    let mass = match window {
        Window::Rect {
            xmin,
            xmax,
            ymin,
            ymax,
        } => {
            let s = kernel.sigma;
            let mx = std_normal_cdf((xmax - x) / s) - std_normal_cdf((xmin - x) / s);
            let my = std_normal_cdf((ymax - y) / s) - std_normal_cdf((ymin - y) / s);
            mx * my
        }
        Window::Polygon { .. } => {
            let radius = kernel.radius();
            let (i_lo, i_hi) = grid.span(x, grid.x0, grid.dx, radius, grid.nx);
            let (j_lo, j_hi) = grid.span(y, grid.y0, grid.dy, radius, grid.ny);
            let mut acc = 0.0;
            for j in j_lo..=j_hi {
                for i in i_lo..=i_hi {
                    if mask[grid.index(i, j)] {
                        let (cx, cy) = grid.center(i, j);
                        acc += kernel.eval(cx - x, cy - y);
                    }
                }
            }
            acc * grid.cell_area()
        }
    };
    mass.max(MIN_EDGE_MASS)
}
