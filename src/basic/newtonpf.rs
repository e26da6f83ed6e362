use nalgebra::DVector;
use nalgebra_sparse::{CscMatrix, CsrMatrix};
use num_complex::Complex64;

use super::classify::BusOrdering;
use super::equations::{compute_injections, power_mismatch};
use super::iwamoto::optimal_multiplier;
use super::jacobian::build_jacobian;
use super::solver::Solve;
use super::state::{Setpoints, SolutionState};
use crate::GridError;

/// Result of a Newton-Raphson run.
///
/// Exhausting the iteration budget is a normal outcome, not an error; only
/// a failed factorization aborts the run.
#[derive(Debug, Clone, Copy)]
pub struct NewtonOutcome {
    pub converged: bool,
    pub iterations: usize,
}

/// Runs the Newton-Raphson iteration in polar coordinates.
///
/// Per iteration: assemble the Jacobian at the current state, solve
/// `J * x = mismatch` with the sparse LU backend, map the solution back to
/// angle and magnitude corrections through the `pqpv` ordering, apply the
/// update (optionally scaled by the Iwamoto multiplier) and re-evaluate the
/// mismatch. A state whose initial mismatch is already inside the tolerance
/// converges with zero iterations.
///
/// PV buses take part with their angle only; after every update their
/// magnitude is forced back to the voltage set-point, mirroring the local
/// voltage control of the machine. Once converged, the reactive power the
/// PV equations never solved for is evaluated and stored.
#[allow(clippy::too_many_arguments)]
pub fn newton_pf<S: Solve>(
    y_bus: &CsrMatrix<Complex64>,
    ordering: &BusOrdering,
    state: &mut SolutionState,
    setpoints: &Setpoints,
    tolerance: f64,
    max_iterations: usize,
    with_iwamoto: bool,
    solver: &mut S,
) -> Result<NewtonOutcome, GridError> {
    let n = state.len();
    let num_unknowns = ordering.num_unknowns();
    if num_unknowns == 0 {
        return Ok(NewtonOutcome {
            converged: true,
            iterations: 0,
        });
    }

    let mut p_calc = DVector::zeros(n);
    let mut q_calc = DVector::zeros(n);
    let mut mismatch = DVector::zeros(num_unknowns);
    let mut inc_v = DVector::zeros(n);
    let mut inc_d = DVector::zeros(n);

    compute_injections(y_bus, &state.v, &state.d, &mut p_calc, &mut q_calc);
    power_mismatch(
        &mut mismatch,
        ordering,
        &setpoints.p,
        &setpoints.q,
        &p_calc,
        &q_calc,
    );

    let mut converged = mismatch.amax() <= tolerance;
    let mut iterations = 0;

    for iteration in 1..=max_iterations {
        if converged {
            break;
        }
        let jacobian = build_jacobian(y_bus, ordering, &state.v, &state.d, &p_calc, &q_calc);

        let mut step = mismatch.clone();
        solve_in_place(solver, &jacobian, &mut step)
            .map_err(|reason| GridError::SingularJacobian { iteration, reason })?;

        increments(&mut inc_v, &mut inc_d, ordering, &step);

        let mu = if with_iwamoto {
            optimal_multiplier(
                y_bus, ordering, &jacobian, &mismatch, &inc_v, &inc_d, &step, &p_calc, &q_calc,
                tolerance,
            )
        } else {
            1.0
        };
        log::debug!("iteration {}: step multiplier {}", iteration, mu);

        update_state(state, ordering, setpoints, &step, mu);

        compute_injections(y_bus, &state.v, &state.d, &mut p_calc, &mut q_calc);
        power_mismatch(
            &mut mismatch,
            ordering,
            &setpoints.p,
            &setpoints.q,
            &p_calc,
            &q_calc,
        );
        log::debug!("iteration {}: max mismatch {:e}", iteration, mismatch.amax());

        converged = mismatch.amax() <= tolerance;
        iterations = iteration;
    }

    if converged {
        // close the loop on the quantity the PV equations left open
        for &k in &ordering.pv {
            state.q[k] = q_calc[k];
        }
        log::info!("converged in {} iterations", iterations);
    } else {
        log::info!("not converged within {} iterations", iterations);
    }

    Ok(NewtonOutcome {
        converged,
        iterations,
    })
}

fn solve_in_place<S: Solve>(
    solver: &mut S,
    jacobian: &CscMatrix<f64>,
    rhs: &mut DVector<f64>,
) -> Result<(), &'static str> {
    let n = jacobian.nrows();
    let (mut ap, mut ai, mut ax) = jacobian.clone().disassemble();
    solver.solve(&mut ap, &mut ai, &mut ax, rhs.as_mut_slice(), n)
}

/// Scatters the unknown vector into full-length angle/magnitude increments.
fn increments(
    inc_v: &mut DVector<f64>,
    inc_d: &mut DVector<f64>,
    ordering: &BusOrdering,
    step: &DVector<f64>,
) {
    let npq = ordering.npq();
    let npqpv = ordering.npqpv();
    inc_v.fill(0.0);
    inc_d.fill(0.0);
    for (a, &k) in ordering.pqpv.iter().enumerate() {
        inc_d[k] = step[a];
        if a < npq {
            inc_v[k] = step[npqpv + a];
        }
    }
}

fn update_state(
    state: &mut SolutionState,
    ordering: &BusOrdering,
    setpoints: &Setpoints,
    step: &DVector<f64>,
    mu: f64,
) {
    let npq = ordering.npq();
    let npqpv = ordering.npqpv();
    for (a, &k) in ordering.pqpv.iter().enumerate() {
        state.d[k] += mu * step[a];
        if a < npq {
            state.v[k] *= 1.0 + mu * step[npqpv + a];
        }
    }
    // PV magnitudes stay pinned to their set-point, the angle keeps the
    // Newton update
    for &k in &ordering.pv {
        state.v[k] = setpoints.v[k];
    }
}
