use nalgebra::DVector;
use num_complex::Complex64;

/// The solution vectors of a power flow evaluation, in per-unit.
///
/// Owned by the solver; mutated only by the Newton iteration while a solve
/// is running and by the post-solve projection afterwards. The vectors
/// persist between evaluations so a later run can warm-start from them.
#[derive(Debug, Clone)]
pub struct SolutionState {
    /// Voltage magnitude per node.
    pub v: DVector<f64>,
    /// Voltage angle per node, in rad.
    pub d: DVector<f64>,
    /// Active power injection per node.
    pub p: DVector<f64>,
    /// Reactive power injection per node.
    pub q: DVector<f64>,
}

impl SolutionState {
    pub fn zeros(n: usize) -> Self {
        Self {
            v: DVector::zeros(n),
            d: DVector::zeros(n),
            p: DVector::zeros(n),
            q: DVector::zeros(n),
        }
    }

    pub fn len(&self) -> usize {
        self.v.len()
    }

    pub fn is_empty(&self) -> bool {
        self.v.len() == 0
    }

    /// Complex voltage at node `k`, derived from magnitude and angle.
    pub fn complex_voltage(&self, k: usize) -> Complex64 {
        Complex64::from_polar(self.v[k], self.d[k])
    }

    /// Complex power at node `k`.
    pub fn complex_power(&self, k: usize) -> Complex64 {
        Complex64::new(self.p[k], self.q[k])
    }
}

/// Specified injections and voltage set-points, fixed at initialization.
///
/// `p` and `q` are the target injections the mismatch is measured against;
/// `v` pins the magnitude of PV and slack buses.
#[derive(Debug, Clone)]
pub struct Setpoints {
    pub p: DVector<f64>,
    pub q: DVector<f64>,
    pub v: DVector<f64>,
}

impl Setpoints {
    pub fn zeros(n: usize) -> Self {
        Self {
            p: DVector::zeros(n),
            q: DVector::zeros(n),
            v: DVector::zeros(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complex_views_are_derived() {
        let mut state = SolutionState::zeros(2);
        state.v[1] = 2.0;
        state.d[1] = std::f64::consts::FRAC_PI_2;
        let v = state.complex_voltage(1);
        assert!((v.re - 0.0).abs() < 1e-12);
        assert!((v.im - 2.0).abs() < 1e-12);
    }
}
