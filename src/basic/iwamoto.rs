use nalgebra::DVector;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use num_complex::Complex64;

use super::classify::BusOrdering;
use super::jacobian::build_jacobian;

const MAX_ROOT_ITERATIONS: usize = 50;
const DERIVATIVE_FLOOR: f64 = 1e-12;

/// Computes the optimal step-length multiplier described in
/// "A Load Flow Calculation Method for Ill-Conditioned Power Systems" by
/// Iwamoto, S. and Tamura, Y.
///
/// A second Jacobian evaluated at the increment direction supplies the
/// second-order term of the mismatch expansion. With `a` the mismatch,
/// `b = J*x` and `c = x o (J2*x) / 2` the optimal multiplier is the real
/// root near 1 of
///
/// `g3*u^3 + g2*u^2 + g1*u + g0 = 0`
///
/// with `g0 = -a.b`, `g1 = b.b + 2 a.c`, `g2 = -3 b.c`, `g3 = 2 c.c`.
/// If the inner root search stalls or meets a vanishing derivative the step
/// is left unscaled.
#[allow(clippy::too_many_arguments)]
pub(crate) fn optimal_multiplier(
    y_bus: &CsrMatrix<Complex64>,
    ordering: &BusOrdering,
    jacobian: &CscMatrix<f64>,
    mismatch: &DVector<f64>,
    inc_v: &DVector<f64>,
    inc_d: &DVector<f64>,
    step: &DVector<f64>,
    p_calc: &DVector<f64>,
    q_calc: &DVector<f64>,
    tolerance: f64,
) -> f64 {
    let j2 = build_jacobian(y_bus, ordering, inc_v, inc_d, p_calc, q_calc);

    let a = mismatch;
    let b = jacobian * step;
    let c = 0.5 * step.component_mul(&(&j2 * step));

    let g0 = -a.dot(&b);
    let g1 = b.dot(&b) + 2.0 * a.dot(&c);
    let g2 = -3.0 * b.dot(&c);
    let g3 = 2.0 * c.dot(&c);

    match solve_cubic(g3, g2, g1, g0, tolerance) {
        Some(mu) => mu,
        None => {
            log::warn!("optimal multiplier root search failed, applying the unscaled step");
            1.0
        }
    }
}

/// Newton root search on `a*x^3 + b*x^2 + c*x + d` starting at `x = 1`.
///
/// Bounded, and guarded against a vanishing derivative; returns `None` when
/// no root is found so the caller can fall back to a plain step.
fn solve_cubic(a: f64, b: f64, c: f64, d: f64, tolerance: f64) -> Option<f64> {
    let mut x = 1.0f64;
    for _ in 0..MAX_ROOT_ITERATIONS {
        let fx = a * x * x * x + b * x * x + c * x + d;
        let fdx = 3.0 * a * x * x + 2.0 * b * x + c;
        if fdx.abs() < DERIVATIVE_FLOOR {
            return None;
        }
        let inc = fx / fdx;
        x -= inc;
        if !x.is_finite() {
            return None;
        }
        if inc.abs() <= tolerance {
            return Some(x);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cubic_root_near_one_is_found() {
        // (x - 1.1)(x^2 + x + 1), real root at 1.1
        let root = solve_cubic(1.0, -0.1, -0.1, -1.1, 1e-12).unwrap();
        assert!((root - 1.1).abs() < 1e-9, "root = {}", root);
    }

    #[test]
    fn vanishing_derivative_reports_failure() {
        // f(x) = x^3 - 3x^2 + 3x has f'(1) = 0
        assert_eq!(solve_cubic(1.0, -3.0, 3.0, -1.0, 1e-12), None);
    }
}
