use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;
use num_complex::Complex64;

use super::classify::BusOrdering;

/// Active power injected at bus `k` for the given voltage state.
///
/// `P(k) = V_k * sum_j V_j * (G_kj cos(d_k - d_j) + B_kj sin(d_k - d_j))`,
/// summed over the sparse row `k`; absent entries contribute nothing.
pub fn bus_active_power(
    y_bus: &CsrMatrix<Complex64>,
    v: &DVector<f64>,
    d: &DVector<f64>,
    k: usize,
) -> f64 {
    let row = y_bus.row(k);
    let mut val = 0.0;
    for (&j, y_kj) in row.col_indices().iter().zip(row.values()) {
        let dd = d[k] - d[j];
        val += v[j] * (y_kj.re * dd.cos() + y_kj.im * dd.sin());
    }
    v[k] * val
}

/// Reactive power injected at bus `k` for the given voltage state.
///
/// `Q(k) = V_k * sum_j V_j * (G_kj sin(d_k - d_j) - B_kj cos(d_k - d_j))`.
pub fn bus_reactive_power(
    y_bus: &CsrMatrix<Complex64>,
    v: &DVector<f64>,
    d: &DVector<f64>,
    k: usize,
) -> f64 {
    let row = y_bus.row(k);
    let mut val = 0.0;
    for (&j, y_kj) in row.col_indices().iter().zip(row.values()) {
        let dd = d[k] - d[j];
        val += v[j] * (y_kj.re * dd.sin() - y_kj.im * dd.cos());
    }
    v[k] * val
}

/// Evaluates the injections at every bus in one sweep over the matrix.
///
/// One evaluation per iteration feeds both the mismatch vector and the
/// Jacobian diagonals.
pub fn compute_injections(
    y_bus: &CsrMatrix<Complex64>,
    v: &DVector<f64>,
    d: &DVector<f64>,
    p_calc: &mut DVector<f64>,
    q_calc: &mut DVector<f64>,
) {
    for k in 0..y_bus.nrows() {
        let row = y_bus.row(k);
        let mut p = 0.0;
        let mut q = 0.0;
        for (&j, y_kj) in row.col_indices().iter().zip(row.values()) {
            let dd = d[k] - d[j];
            let (sin, cos) = dd.sin_cos();
            p += v[j] * (y_kj.re * cos + y_kj.im * sin);
            q += v[j] * (y_kj.re * sin - y_kj.im * cos);
        }
        p_calc[k] = v[k] * p;
        q_calc[k] = v[k] * q;
    }
}

/// Fills the power mismatch vector for the current state.
///
/// Layout follows the `pqpv` ordering: entry `a` is the active mismatch of
/// bus `pqpv[a]`; entry `npqpv + a` is the reactive mismatch, present for PQ
/// rows only.
pub fn power_mismatch(
    mismatch: &mut DVector<f64>,
    ordering: &BusOrdering,
    p_spec: &DVector<f64>,
    q_spec: &DVector<f64>,
    p_calc: &DVector<f64>,
    q_calc: &DVector<f64>,
) {
    let npq = ordering.npq();
    let npqpv = ordering.npqpv();
    for (a, &k) in ordering.pqpv.iter().enumerate() {
        mismatch[a] = p_spec[k] - p_calc[k];
        if a < npq {
            mismatch[npqpv + a] = q_spec[k] - q_calc[k];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra_sparse::CooMatrix;

    // A two-bus system with y = 1 - 5j pu between the buses.
    fn small_y() -> CsrMatrix<Complex64> {
        let y = Complex64::new(1.0, -5.0);
        let mut coo = CooMatrix::new(2, 2);
        coo.push(0, 0, y);
        coo.push(0, 1, -y);
        coo.push(1, 0, -y);
        coo.push(1, 1, y);
        CsrMatrix::from(&coo)
    }

    #[test]
    fn flat_state_has_zero_injection() {
        let y = small_y();
        let v = DVector::from_element(2, 1.0);
        let d = DVector::zeros(2);
        assert!(bus_active_power(&y, &v, &d, 0).abs() < 1e-12);
        assert!(bus_reactive_power(&y, &v, &d, 1).abs() < 1e-12);
    }

    #[test]
    fn injection_matches_complex_power_balance() {
        // S_k = V_k * conj(sum_j Y_kj V_j) must agree with the polar form
        let y = small_y();
        let v = DVector::from_vec(vec![1.02, 0.97]);
        let d = DVector::from_vec(vec![0.0, -0.05]);
        let vc: Vec<Complex64> = (0..2).map(|k| Complex64::from_polar(v[k], d[k])).collect();
        for k in 0..2 {
            let mut i = Complex64::new(0.0, 0.0);
            let row = y.row(k);
            for (&j, y_kj) in row.col_indices().iter().zip(row.values()) {
                i += y_kj * vc[j];
            }
            let s = vc[k] * i.conj();
            assert!((bus_active_power(&y, &v, &d, k) - s.re).abs() < 1e-12);
            assert!((bus_reactive_power(&y, &v, &d, k) - s.im).abs() < 1e-12);
        }
    }

    #[test]
    fn bulk_injections_match_single_bus_form() {
        let y = small_y();
        let v = DVector::from_vec(vec![1.02, 0.97]);
        let d = DVector::from_vec(vec![0.0, -0.05]);
        let mut p = DVector::zeros(2);
        let mut q = DVector::zeros(2);
        compute_injections(&y, &v, &d, &mut p, &mut q);
        for k in 0..2 {
            assert!((p[k] - bus_active_power(&y, &v, &d, k)).abs() < 1e-12);
            assert!((q[k] - bus_reactive_power(&y, &v, &d, k)).abs() < 1e-12);
        }
    }
}
