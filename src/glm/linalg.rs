//! Small dense symmetric solvers on row-major flat buffers
//!
//! Design matrices here have a handful of columns, so a straightforward
//! Cholesky factorisation is all the per-gene fits need.

use ndarray::Array2;

/// X' W X as a flat n_coefs x n_coefs buffer
pub(crate) fn xtwx(design: &Array2<f64>, weights: &[f64]) -> Vec<f64> {
    let p = design.ncols();
    let mut out = vec![0.0; p * p];
    for (i, &w) in weights.iter().enumerate() {
        for j in 0..p {
            let xij = design[[i, j]];
            for k in 0..p {
                out[j * p + k] += w * xij * design[[i, k]];
            }
        }
    }
    out
}

/// Lower Cholesky factor; non-positive pivots are floored at 1e-12
fn cholesky(a: &[f64], n: usize) -> Vec<f64> {
    let mut l = vec![0.0; n * n];
    for i in 0..n {
        for j in 0..=i {
            let mut sum = a[i * n + j];
            for k in 0..j {
                sum -= l[i * n + k] * l[j * n + k];
            }
            if i == j {
                l[i * n + j] = sum.max(1e-12).sqrt();
            } else {
                l[i * n + j] = sum / l[j * n + j];
            }
        }
    }
    l
}

/// Solve A x = b for symmetric positive definite A
pub(crate) fn solve_symmetric(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let l = cholesky(a, n);

    let mut y = vec![0.0; n];
    for i in 0..n {
        let mut sum = b[i];
        for j in 0..i {
            sum -= l[i * n + j] * y[j];
        }
        y[i] = sum / l[i * n + i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = y[i];
        for j in (i + 1)..n {
            sum -= l[j * n + i] * x[j];
        }
        x[i] = sum / l[i * n + i];
    }
    x
}

pub(crate) fn invert_symmetric(a: &[f64], n: usize) -> Vec<f64> {
    let mut inv = vec![0.0; n * n];
    for i in 0..n {
        let mut e = vec![0.0; n];
        e[i] = 1.0;
        let col = solve_symmetric(a, &e, n);
        for j in 0..n {
            inv[j * n + i] = col[j];
        }
    }
    inv
}

/// log det(A) for symmetric positive definite A
pub(crate) fn log_det_symmetric(a: &[f64], n: usize) -> f64 {
    let l = cholesky(a, n);
    (0..n).map(|i| 2.0 * l[i * n + i].ln()).sum()
}

/// Flat row-major product of two n x n matrices
pub(crate) fn mat_mul(a: &[f64], b: &[f64], n: usize) -> Vec<f64> {
    let mut out = vec![0.0; n * n];
    for i in 0..n {
        for k in 0..n {
            let aik = a[i * n + k];
            for j in 0..n {
                out[i * n + j] += aik * b[k * n + j];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_and_invert() {
        let a = vec![4.0, 1.0, 1.0, 3.0];
        let x = solve_symmetric(&a, &[1.0, 2.0], 2);
        assert!((4.0 * x[0] + x[1] - 1.0).abs() < 1e-12);
        assert!((x[0] + 3.0 * x[1] - 2.0).abs() < 1e-12);

        let inv = invert_symmetric(&a, 2);
        let id = mat_mul(&a, &inv, 2);
        assert!((id[0] - 1.0).abs() < 1e-12 && id[1].abs() < 1e-12);
        assert!((id[3] - 1.0).abs() < 1e-12 && id[2].abs() < 1e-12);
    }

    #[test]
    fn test_log_det() {
        let a = vec![4.0, 1.0, 1.0, 3.0];
        assert!((log_det_symmetric(&a, 2) - 11.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_xtwx() {
        let design = Array2::from_shape_vec((3, 2), vec![1.0, 0.0, 1.0, 1.0, 1.0, 1.0]).unwrap();
        let m = xtwx(&design, &[1.0, 2.0, 3.0]);
        assert_eq!(m, vec![6.0, 5.0, 5.0, 5.0]);
    }
}
