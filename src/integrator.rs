//! A generic, fixed-dimension explicit Runge-Kutta 4 integrator.
//!
//! This mirrors `original_source/include/RungeKuttaODESolver.hpp`: the
//! same four-stage algorithm operating over a flat vector of scalars,
//! generalized here to any derivative function rather than tying the
//! solver to a single subclass.

use tracing::{instrument, trace};

/// Stateless classical RK4 integrator over `Vec<f64>` state vectors.
///
/// The derivative function `f(state, t) -> state'` must return a vector of
/// the same length as `state`; dimension mismatches are a programmer error
/// (see spec.md §7) and are caught with a debug assertion rather than
/// surfaced as a `Result` — there is nothing a caller could usefully
/// recover from.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rk4Integrator;

impl Rk4Integrator {
    pub fn new() -> Rk4Integrator {
        Rk4Integrator
    }

    /// Advances `state` by `h` starting at time `t`, returning the new state.
    #[instrument(level = "trace", skip(self, state, f))]
    pub fn step<F>(&self, state: &[f64], t: f64, h: f64, mut f: F) -> Vec<f64>
    where
        F: FnMut(&[f64], f64) -> Vec<f64>,
    {
        let dim = state.len();
        let half = h / 2.0;

        let k1 = f(state, t);
        debug_assert_eq!(k1.len(), dim, "derivative dimension must match state dimension");

        let x2 = add_scaled(state, &k1, half);
        let k2 = f(&x2, t + half);
        debug_assert_eq!(k2.len(), dim);

        let x3 = add_scaled(state, &k2, half);
        let k3 = f(&x3, t + half);
        debug_assert_eq!(k3.len(), dim);

        let x4 = add_scaled(state, &k3, h);
        let k4 = f(&x4, t + h);
        debug_assert_eq!(k4.len(), dim);

        let mut out = Vec::with_capacity(dim);
        for i in 0..dim {
            out.push(state[i] + (h / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]));
        }
        trace!(h, t, dim, "rk4 step complete");
        out
    }
}

fn add_scaled(base: &[f64], delta: &[f64], factor: f64) -> Vec<f64> {
    base.iter()
        .zip(delta.iter())
        .map(|(b, d)| b + factor * d)
        .collect()
}
