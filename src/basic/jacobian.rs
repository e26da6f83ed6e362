use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CscMatrix, CsrMatrix};
use num_complex::Complex64;

use super::classify::BusOrdering;

/// Assembles the Newton-Raphson Jacobian in polar form.
///
/// The matrix is square of dimension `2*npq + npv` and consists of four
/// blocks over the `pqpv` ordering (`k = pqpv[a]`, `j = pqpv[b]`):
///
/// * `dP/dd`   (npqpv x npqpv), rows/cols `a`, `b`
/// * `dP/d|V|` (npqpv x npq), columns offset by `npqpv`
/// * `dQ/dd`   (npq x npqpv), rows offset by `npqpv`
/// * `dQ/d|V|` (npq x npq), both offset by `npqpv`
///
/// Magnitude derivatives are taken with respect to the relative correction
/// `V <- V*(1+x)`, which is how the update step applies them. The matrix is
/// rebuilt from scratch on every call; off-diagonal entries follow the
/// sparsity of the admittance matrix, diagonal entries are always present.
///
/// The injections `p_calc`/`q_calc` enter the diagonal terms. The optimal
/// multiplier evaluates this same assembly with increment vectors in place
/// of `v` and `d` to obtain its second-order term.
pub fn build_jacobian(
    y_bus: &CsrMatrix<Complex64>,
    ordering: &BusOrdering,
    v: &DVector<f64>,
    d: &DVector<f64>,
    p_calc: &DVector<f64>,
    q_calc: &DVector<f64>,
) -> CscMatrix<f64> {
    let npq = ordering.npq();
    let npqpv = ordering.npqpv();
    let n = ordering.num_unknowns();

    let mut triplets = CooMatrix::new(n, n);

    for (a, &k) in ordering.pqpv.iter().enumerate() {
        let row = y_bus.row(k);
        let mut g_kk = 0.0;
        let mut b_kk = 0.0;

        for (&j, y_kj) in row.col_indices().iter().zip(row.values()) {
            if j == k {
                g_kk = y_kj.re;
                b_kk = y_kj.im;
                continue;
            }
            let Some(b) = ordering.position(j) else {
                continue;
            };
            let dd = d[k] - d[j];
            let (sin, cos) = dd.sin_cos();
            let vv = v[k] * v[j];
            let angle_term = vv * (y_kj.re * sin - y_kj.im * cos);
            let magnitude_term = vv * (y_kj.re * cos + y_kj.im * sin);

            triplets.push(a, b, angle_term);
            if b < npq {
                triplets.push(a, npqpv + b, magnitude_term);
            }
            if a < npq {
                triplets.push(npqpv + a, b, -magnitude_term);
            }
            if a < npq && b < npq {
                triplets.push(npqpv + a, npqpv + b, angle_term);
            }
        }

        let v_sq = v[k] * v[k];
        triplets.push(a, a, -q_calc[k] - b_kk * v_sq);
        if a < npq {
            triplets.push(a, npqpv + a, p_calc[k] + g_kk * v_sq);
            triplets.push(npqpv + a, a, p_calc[k] - g_kk * v_sq);
            triplets.push(npqpv + a, npqpv + a, q_calc[k] - b_kk * v_sq);
        }
    }

    CscMatrix::from(&triplets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basic::classify::classify;
    use crate::basic::equations::{compute_injections, power_mismatch};
    use crate::model::compose_y;
    use crate::powerflow::select_base_power;
    use crate::testcases;
    use nalgebra::DMatrix;

    fn dense(csc: &CscMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(csc.nrows(), csc.ncols());
        for (i, j, val) in csc.triplet_iter() {
            out[(i, j)] += *val;
        }
        out
    }

    /// Applies unknown-vector entry `a` with magnitude `eps` to the state.
    fn perturb(
        v: &mut DVector<f64>,
        d: &mut DVector<f64>,
        ordering: &BusOrdering,
        a: usize,
        eps: f64,
    ) {
        let npqpv = ordering.npqpv();
        if a < npqpv {
            d[ordering.pqpv[a]] += eps;
        } else {
            let k = ordering.pqpv[a - npqpv];
            v[k] *= 1.0 + eps;
        }
    }

    #[test]
    fn jacobian_matches_finite_differences() {
        let mut net = testcases::three_bus();
        let s_base = select_base_power(&net);
        let ordering = classify(&net).unwrap();
        let y = compose_y(&mut net, s_base).unwrap();
        let n = net.nodes.len();

        // an off-flat state so every block has nontrivial entries
        let v0 = DVector::from_vec(vec![1.0, 0.97, 1.02]);
        let d0 = DVector::from_vec(vec![0.0, -0.03, 0.02]);
        let p_spec = DVector::zeros(n);
        let q_spec = DVector::zeros(n);

        let mut p_calc = DVector::zeros(n);
        let mut q_calc = DVector::zeros(n);
        compute_injections(&y, &v0, &d0, &mut p_calc, &mut q_calc);
        let jac = dense(&build_jacobian(&y, &ordering, &v0, &d0, &p_calc, &q_calc));

        let m = ordering.num_unknowns();
        let eps = 1e-6;
        for a in 0..m {
            let mut mis_plus = DVector::zeros(m);
            let mut mis_minus = DVector::zeros(m);

            let mut v = v0.clone();
            let mut d = d0.clone();
            perturb(&mut v, &mut d, &ordering, a, eps);
            compute_injections(&y, &v, &d, &mut p_calc, &mut q_calc);
            power_mismatch(&mut mis_plus, &ordering, &p_spec, &q_spec, &p_calc, &q_calc);

            let mut v = v0.clone();
            let mut d = d0.clone();
            perturb(&mut v, &mut d, &ordering, a, -eps);
            compute_injections(&y, &v, &d, &mut p_calc, &mut q_calc);
            power_mismatch(&mut mis_minus, &ordering, &p_spec, &q_spec, &p_calc, &q_calc);

            // mismatch = spec - calc, so its derivative is -J
            for r in 0..m {
                let fd = -(mis_plus[r] - mis_minus[r]) / (2.0 * eps);
                let ref_val = jac[(r, a)];
                assert!(
                    (fd - ref_val).abs() < 1e-4 * (1.0 + ref_val.abs()),
                    "J[{},{}] = {} but finite difference gives {}",
                    r,
                    a,
                    ref_val,
                    fd
                );
            }
        }
    }
}
