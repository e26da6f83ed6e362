use rsparse::{
    self,
    data::{self, Numeric, Symb},
    lsolve, lu, sqr, usolve,
};

use super::Solve;

/// Sparse LU backend built on the rsparse crate.
///
/// The symbolic ordering is computed once and reused while the matrix
/// pattern stays the same; only the numeric factorization runs per call.
#[derive(Default, Debug)]
pub struct RSparseSolver {
    work: Option<Vec<f64>>,
    symbolic: Option<Symb>,
}

impl Solve for RSparseSolver {
    fn solve(
        &mut self,
        ap: &mut [usize],
        ai: &mut [usize],
        ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        let p: Vec<isize> = ap.iter().map(|&v| v as isize).collect();
        let a = data::Sprs {
            m: n,
            n,
            i: ai.to_vec(),
            p,
            x: ax.to_vec(),
            nzmax: ax.len(),
        };

        if self.symbolic.is_none() || self.work.as_ref().is_none_or(|w| w.len() != n) {
            self.symbolic = Some(sqr(&a, 1, false));
            self.work = Some(vec![0.0; n]);
        }
        let x = self.work.as_mut().unwrap();
        let symbolic = self.symbolic.as_mut().unwrap();

        let numeric = lu(&a, symbolic, 1e-6).map_err(|_| "LU factorization failed")?;
        ipvec(&numeric.pinv, b, &mut x[..]); // x = P*b
        lsolve(&numeric.l, x); // x = L\x
        usolve(&numeric.u, x); // x = U\x
        ipvec(&symbolic.q, x, &mut b[..]); // b = Q*x

        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
        self.work = None;
    }
}

fn ipvec_identity<T: Numeric<T>>(b: &[T], x: &mut [T]) {
    x.copy_from_slice(b);
}

fn ipvec_perm<T: Numeric<T>>(p: &[isize], b: &[T], x: &mut [T]) {
    for k in 0..b.len() {
        x[p[k] as usize] = b[k];
    }
}

fn ipvec<T: Numeric<T>>(p: &Option<Vec<isize>>, b: &[T], x: &mut [T]) {
    match p {
        Some(pvec) => ipvec_perm(pvec, b, x),
        None => ipvec_identity(b, x),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_a_small_system() {
        // [[4, 1], [1, 3]] * x = [1, 2], x = [1/11, 7/11]
        let mut ap = vec![0usize, 2, 4];
        let mut ai = vec![0usize, 1, 0, 1];
        let mut ax = vec![4.0, 1.0, 1.0, 3.0];
        let mut b = vec![1.0, 2.0];
        let mut solver = RSparseSolver::default();
        solver.solve(&mut ap, &mut ai, &mut ax, &mut b, 2).unwrap();
        assert!((b[0] - 1.0 / 11.0).abs() < 1e-12, "x0 = {}", b[0]);
        assert!((b[1] - 7.0 / 11.0).abs() < 1e-12, "x1 = {}", b[1]);
    }
}
