use nalgebra::{Cholesky, DMatrix, DVector, Dyn};

/// Cholesky factor of a symmetric information matrix, retried once with
/// trace-scaled jitter when the matrix is numerically semi-definite.
pub fn safe_cholesky(matrix: &DMatrix<f64>) -> Option<Cholesky<f64, Dyn>> {
    if let Some(chol) = Cholesky::new(matrix.clone()) {
        return Some(chol);
    }
    let n = matrix.nrows().max(1);
    let jitter = 1e-10 + (matrix.trace().abs() / n as f64) * 1e-8;
    let mut regularized = matrix.clone();
    for i in 0..matrix.nrows() {
        regularized[(i, i)] += jitter;
    }
    Cholesky::new(regularized)
}

/// `X^T diag(w) X`.
pub fn weighted_gram(x: &DMatrix<f64>, w: &DVector<f64>) -> DMatrix<f64> {
    let mut xw = x.clone();
    for (mut row, wi) in xw.row_iter_mut().zip(w.iter()) {
        row *= *wi;
    }
    x.transpose() * xw
}

/// `X^T (w .* v)`.
pub fn weighted_cross(x: &DMatrix<f64>, w: &DVector<f64>, v: &DVector<f64>) -> DVector<f64> {
    x.transpose() * w.component_mul(v)
}

pub fn max_abs(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0f64, |acc, x| acc.max(x.abs()))
}
