use serde::{Deserialize, Serialize};

/// Bounded region in which points were recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Window {
    Rect {
        xmin: f64,
        xmax: f64,
        ymin: f64,
        ymax: f64,
    },
    /// Simple polygon; vertices in either orientation, not closed.
    Polygon { vertices: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

impl Window {
    pub fn rect(xmin: f64, xmax: f64, ymin: f64, ymax: f64) -> Self {
        Self::Rect {
            xmin,
            xmax,
            ymin,
            ymax,
        }
    }

    pub fn area(&self) -> f64 {
        match self {
            Self::Rect {
                xmin,
                xmax,
                ymin,
                ymax,
            } => (xmax - xmin).max(0.0) * (ymax - ymin).max(0.0),
            Self::Polygon { vertices } => shoelace(vertices).abs(),
        }
    }

    pub fn bounds(&self) -> Bounds {
        match self {
            Self::Rect {
                xmin,
                xmax,
                ymin,
                ymax,
            } => Bounds {
                xmin: *xmin,
                xmax: *xmax,
                ymin: *ymin,
                ymax: *ymax,
            },
            Self::Polygon { vertices } => {
                let mut b = Bounds {
                    xmin: f64::INFINITY,
                    xmax: f64::NEG_INFINITY,
                    ymin: f64::INFINITY,
                    ymax: f64::NEG_INFINITY,
                };
                for [x, y] in vertices {
                    b.xmin = b.xmin.min(*x);
                    b.xmax = b.xmax.max(*x);
                    b.ymin = b.ymin.min(*y);
                    b.ymax = b.ymax.max(*y);
                }
                b
            }
        }
    }

    /// True when the window has no usable area.
    pub fn is_degenerate(&self) -> bool {
        let finite = match self {
            Self::Rect {
                xmin,
                xmax,
                ymin,
                ymax,
            } => [xmin, xmax, ymin, ymax].iter().all(|v| v.is_finite()),
            Self::Polygon { vertices } => {
                vertices.len() >= 3
                    && vertices.iter().all(|[x, y]| x.is_finite() && y.is_finite())
            }
        };
        !finite || !(self.area() > 0.0)
    }

    /// Boundary points count as inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        match self {
            Self::Rect {
                xmin,
                xmax,
                ymin,
                ymax,
            } => x >= *xmin && x <= *xmax && y >= *ymin && y <= *ymax,
            Self::Polygon { vertices } if vertices.len() < 3 => false,
            Self::Polygon { vertices } => {
                on_polygon_boundary(vertices, x, y) || crossing_number(vertices, x, y)
            }
        }
    }

    pub fn shortest_side(&self) -> f64 {
        let b = self.bounds();
        b.width().min(b.height())
    }
}

fn shoelace(vertices: &[[f64; 2]]) -> f64 {
    let n = vertices.len();
    if n < 3 {
        return 0.0;
    }
    let mut acc = 0.0;
    for i in 0..n {
        let [x0, y0] = vertices[i];
        let [x1, y1] = vertices[(i + 1) % n];
        acc += x0 * y1 - x1 * y0;
    }
    acc / 2.0
}

fn crossing_number(vertices: &[[f64; 2]], x: f64, y: f64) -> bool {
    let n = vertices.len();
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = vertices[i];
        let [xj, yj] = vertices[j];
        if (yi > y) != (yj > y) {
            let x_cross = xi + (y - yi) * (xj - xi) / (yj - yi);
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn on_polygon_boundary(vertices: &[[f64; 2]], x: f64, y: f64) -> bool {
    const EPS: f64 = 1e-12;
    let n = vertices.len();
    for i in 0..n {
        let [x0, y0] = vertices[i];
        let [x1, y1] = vertices[(i + 1) % n];
        let cross = (x1 - x0) * (y - y0) - (y1 - y0) * (x - x0);
        let scale = ((x1 - x0).abs() + (y1 - y0).abs()).max(1.0);
        if cross.abs() > EPS * scale {
            continue;
        }
        if x >= x0.min(x1) - EPS && x <= x0.max(x1) + EPS && y >= y0.min(y1) - EPS
            && y <= y0.max(y1) + EPS
        {
            return true;
        }
    }
    false
}
