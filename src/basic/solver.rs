#[cfg(feature = "faer")]
mod faer;
#[cfg(feature = "faer")]
pub use faer::*;

#[cfg(feature = "rsparse")]
mod rsparse;
#[cfg(feature = "rsparse")]
pub use rsparse::*;

#[cfg(feature = "faer")]
pub type DefaultSolver = FaerSolver;

#[cfg(all(not(feature = "faer"), feature = "rsparse"))]
pub type DefaultSolver = RSparseSolver;

/// A trait for solving sparse linear systems in CSC form.
///
/// Backends may cache their symbolic factorization between calls; the
/// sparsity pattern of the Jacobian is fixed for a given network, so the
/// cache pays off on every iteration after the first. [`Solve::reset`]
/// drops the cache when the pattern changes (e.g. after re-classification).
pub trait Solve {
    /// Solves the sparse linear system in place of `b`.
    ///
    /// # Parameters
    ///
    /// * `ap` - Column pointers of the matrix.
    /// * `ai` - Row indices of the matrix.
    /// * `ax` - Non-zero values of the matrix.
    /// * `b` - Right-hand side vector, overwritten with the solution.
    /// * `n` - Dimension of the system.
    fn solve(
        &mut self,
        ap: &mut [usize],
        ai: &mut [usize],
        ax: &mut [f64],
        b: &mut [f64],
        n: usize,
    ) -> Result<(), &'static str>;

    /// Invalidates any cached factorization state.
    fn reset(&mut self) {}
}
