//! Polygon contiguity weights.
//!
//! Adjacency A is binary with an empty diagonal. Each row then keeps only its
//! first `k` ones in index order; the cap is positional, not distance-ranked.
use geo::Polygon;

use super::AdjacencyRule;
use crate::geometry::{buffered_intersects, buffered_touches};
use crate::matrix::SquareMatrix;

/// Binary adjacency of the buffered polygons under `rule`, diagonal zero.
pub fn adjacency(polygons: &[Polygon<f64>], rule: AdjacencyRule, buffer: f64) -> SquareMatrix {
    let n = polygons.len();
    let mut a = SquareMatrix::zeros(n);
    // Both predicates are symmetric, so evaluate the upper triangle only.
    for i in 0..n {
        for j in i + 1..n {
            let linked = match rule {
                AdjacencyRule::Rook => buffered_intersects(&polygons[i], &polygons[j], buffer),
                AdjacencyRule::Queen => buffered_touches(&polygons[i], &polygons[j], buffer),
            };
            if linked {
                a.set(i, j, 1.0);
                a.set(j, i, 1.0);
            }
        }
    }
    a
}

/// Keep the first `k` nonzero entries of every row, in index order.
pub fn truncate_rows(a: &SquareMatrix, k: usize) -> SquareMatrix {
    let mut c = a.clone();
    for r in 0..c.n {
        let mut seen = 0usize;
        for v in c.row_mut(r) {
            if *v != 0.0 {
                seen += 1;
                if seen > k {
                    *v = 0.0;
                }
            }
        }
    }
    c
}

/// Raw contiguity weights C.
pub fn contiguity_weights(
    polygons: &[Polygon<f64>],
    rule: AdjacencyRule,
    k: usize,
    buffer: f64,
) -> SquareMatrix {
    truncate_rows(&adjacency(polygons, rule, buffer), k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::tests::square;

    /// 3×3 grid of unit squares, row-major.
    fn grid3() -> Vec<Polygon<f64>> {
        (0..3)
            .flat_map(|r| (0..3).map(move |c| square(c as f64, r as f64, 1.0)))
            .collect()
    }

    #[test]
    fn rook_without_buffer_is_symmetric() {
        let a = adjacency(&grid3(), AdjacencyRule::Rook, 0.0);
        assert!(a.is_symmetric(0.0));
        assert_eq!(a.max_abs_diagonal(), 0.0);
        // Centre cell intersects all eight others, corners included.
        assert_eq!(a.row(4).iter().sum::<f64>(), 8.0);
        // Corner cell 0 reaches 1, 3 and the diagonal 4.
        assert_eq!(a.row(0), &[0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn queen_links_edge_and_corner_contacts() {
        let a = adjacency(&grid3(), AdjacencyRule::Queen, 0.0);
        assert_eq!(a.row(4).iter().sum::<f64>(), 8.0);
        assert!(a.is_symmetric(0.0));
    }

    #[test]
    fn queen_ignores_overlapping_polygons() {
        let polys = vec![square(0.0, 0.0, 1.0), square(0.5, 0.0, 1.0)];
        let a = adjacency(&polys, AdjacencyRule::Queen, 0.0);
        assert_eq!(a.get(0, 1), 0.0);
        let a = adjacency(&polys, AdjacencyRule::Rook, 0.0);
        assert_eq!(a.get(0, 1), 1.0);
    }

    #[test]
    fn truncation_keeps_first_k_in_index_order() {
        let a = adjacency(&grid3(), AdjacencyRule::Rook, 0.0);
        let c = truncate_rows(&a, 2);
        assert_eq!(c.row(4), &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
        assert!(c.row_sums().iter().all(|&s| s <= 2.0));
    }

    #[test]
    fn buffer_links_separated_polygons() {
        let polys: Vec<_> = (0..3).map(|i| square(i as f64 * 2.0, 0.0, 1.0)).collect();
        assert_eq!(contiguity_weights(&polys, AdjacencyRule::Rook, 2, 0.0).row_sums(), vec![0.0; 3]);
        let c = contiguity_weights(&polys, AdjacencyRule::Rook, 2, 0.5);
        assert_eq!(c.row_sums(), vec![1.0, 2.0, 1.0]);
    }
}
