use faer::{
    MatMut,
    linalg::solvers::Solve as FaerSolve,
    sparse::{
        SparseColMatRef, SymbolicSparseColMatRef,
        linalg::solvers::{Lu, SymbolicLu},
    },
};

use super::Solve;

/// Sparse LU backend built on faer.
///
/// Keeps the symbolic analysis across calls with an unchanged pattern.
#[derive(Default)]
pub struct FaerSolver {
    symbolic: Option<SymbolicLu<usize>>,
}

impl Solve for FaerSolver {
    fn solve(
        &mut self,
        ap: &mut [usize],
        ai: &mut [usize],
        ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str> {
        let symbolic_mat = unsafe { SymbolicSparseColMatRef::new_unchecked(n, n, ap, None, ai) };
        let mat = SparseColMatRef::new(symbolic_mat, ax);
        if self.symbolic.is_none() {
            self.symbolic =
                Some(SymbolicLu::try_new(symbolic_mat).map_err(|_| "symbolic analysis failed")?);
        }

        let lu = Lu::try_new_with_symbolic(self.symbolic.as_ref().unwrap().clone(), mat)
            .map_err(|_| "LU factorization failed")?;
        let rhs = MatMut::from_column_major_slice_mut(b, n, 1);
        lu.solve_in_place(rhs);
        Ok(())
    }

    fn reset(&mut self) {
        self.symbolic = None;
    }
}
