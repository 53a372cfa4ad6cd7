use serde::{Deserialize, Serialize};

/// A dense N×N table of f64, row-major.
///
/// Used for the centroid distance matrix, the raw and normalized weight
/// matrices, and the deviation cross-product table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquareMatrix {
    /// Row-major values, `n * n` long.
    pub data: Vec<f64>,
    pub n: usize,
}

impl SquareMatrix {
    /// Create an N×N matrix filled with the given value.
    pub fn new(n: usize, fill: f64) -> Self {
        Self { data: vec![fill; n * n], n }
    }

    pub fn zeros(n: usize) -> Self {
        Self::new(n, 0.0)
    }

    /// Build a matrix by evaluating `f(row, col)` for every cell.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for r in 0..n {
            for c in 0..n {
                data.push(f(r, c));
            }
        }
        Self { data, n }
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f64) {
        self.data[row * self.n + col] = val;
    }

    #[inline]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.n..(row + 1) * self.n]
    }

    #[inline]
    pub fn row_mut(&mut self, row: usize) -> &mut [f64] {
        &mut self.data[row * self.n..(row + 1) * self.n]
    }

    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n).map(|r| self.row(r).iter().sum()).collect()
    }

    /// Largest absolute value on the main diagonal.
    pub fn max_abs_diagonal(&self) -> f64 {
        (0..self.n).map(|i| self.get(i, i).abs()).fold(0.0, f64::max)
    }

    pub fn is_symmetric(&self, tol: f64) -> bool {
        (0..self.n).all(|r| (r + 1..self.n).all(|c| (self.get(r, c) - self.get(c, r)).abs() <= tol))
    }

    /// Nested rows, convenient for delimited-text export by a caller.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n).map(|r| self.row(r).to_vec()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_fn_is_row_major() {
        let m = SquareMatrix::from_fn(3, |r, c| (r * 10 + c) as f64);
        assert_eq!(m.get(0, 2), 2.0);
        assert_eq!(m.get(2, 0), 20.0);
        assert_eq!(m.row(1), &[10.0, 11.0, 12.0]);
        assert_eq!(m.row_sums(), vec![3.0, 33.0, 63.0]);
    }

    #[test]
    fn symmetry_check_respects_tolerance() {
        let mut m = SquareMatrix::zeros(2);
        m.set(0, 1, 1.0);
        m.set(1, 0, 1.0 + 1e-12);
        assert!(m.is_symmetric(1e-9));
        m.set(1, 0, 2.0);
        assert!(!m.is_symmetric(1e-9));
    }
}
