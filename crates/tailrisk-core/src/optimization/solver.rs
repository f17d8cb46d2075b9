use serde::{Deserialize, Serialize};

use crate::error::RiskError;
use crate::RiskResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Budget and tolerances for the constrained minimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Hard upper bound on descent iterations (not time-based).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Convergence tolerance on the objective decrease per iteration.
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
    /// Initial line-search step, halved on failure.
    #[serde(default = "default_initial_step")]
    pub initial_step: f64,
}

fn default_max_iterations() -> u32 {
    200
}

fn default_tolerance() -> f64 {
    1e-10
}

fn default_initial_step() -> f64 {
    0.25
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            tolerance: default_tolerance(),
            initial_step: default_initial_step(),
        }
    }
}

/// Best point found by the minimizer. `converged == false` means the
/// iteration budget ran out while the objective was still improving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOutcome {
    pub weights: Vec<f64>,
    pub objective: f64,
    pub converged: bool,
    pub iterations: u32,
}

// ---------------------------------------------------------------------------
// Projection
// ---------------------------------------------------------------------------

/// Project onto the long-only, fully-invested set: clamp negatives to zero
/// and renormalize to sum 1.
pub(crate) fn project_simplex(w: &mut [f64]) {
    for wi in w.iter_mut() {
        if !wi.is_finite() || *wi < 0.0 {
            *wi = 0.0;
        }
    }
    let total: f64 = w.iter().sum();
    if total > 0.0 {
        for wi in w.iter_mut() {
            *wi /= total;
        }
    } else {
        let equal = 1.0 / w.len() as f64;
        for wi in w.iter_mut() {
            *wi = equal;
        }
    }
}

// ---------------------------------------------------------------------------
// Minimizer
// ---------------------------------------------------------------------------

/// Minimize `objective` over the long-only, fully-invested weight simplex.
///
/// Projected-gradient descent from the equal-weight start: numerical
/// forward-difference gradients, backtracking line search, projection after
/// every step. The algorithm behind this signature is swappable; objective
/// code never sees anything but a `&[f64] -> RiskResult<f64>` callback.
///
/// Sample-based objectives such as empirical ES are piecewise linear, so no
/// smoothness is assumed: the search simply stops once no trial step
/// improves the objective.
pub fn minimize_on_simplex<F>(
    objective: F,
    n_assets: usize,
    options: &SolverOptions,
) -> RiskResult<SolverOutcome>
where
    F: Fn(&[f64]) -> RiskResult<f64>,
{
    if n_assets == 0 {
        return Err(RiskError::InvalidInput {
            field: "n_assets".into(),
            reason: "Cannot optimize an empty portfolio".into(),
        });
    }
    if options.max_iterations == 0 {
        return Err(RiskError::InvalidInput {
            field: "max_iterations".into(),
            reason: "Iteration budget must be positive".into(),
        });
    }

    let mut w = vec![1.0 / n_assets as f64; n_assets];
    let mut f = objective(&w)?;
    if !f.is_finite() {
        return Err(RiskError::NumericalInstability(
            "Objective is not finite at the initial point; no feasible descent step".into(),
        ));
    }

    let grad_eps = 1e-7;
    let min_step = 1e-12;
    let mut converged = false;
    let mut iterations = 0;

    for _ in 0..options.max_iterations {
        iterations += 1;

        // Forward-difference gradient. Perturbed points leave the simplex
        // by grad_eps; the objectives stay well-defined off it.
        let mut grad = vec![0.0; n_assets];
        for i in 0..n_assets {
            let mut perturbed = w.clone();
            perturbed[i] += grad_eps;
            let fi = objective(&perturbed)?;
            grad[i] = (fi - f) / grad_eps;
        }
        if grad.iter().any(|g| !g.is_finite()) {
            return Err(RiskError::NumericalInstability(
                "Gradient is not finite; no feasible descent step".into(),
            ));
        }

        // Backtracking line search with projection.
        let mut step = options.initial_step;
        let mut improved = false;
        while step > min_step {
            let mut candidate: Vec<f64> = w
                .iter()
                .zip(&grad)
                .map(|(wi, gi)| wi - step * gi)
                .collect();
            project_simplex(&mut candidate);
            let fc = objective(&candidate)?;
            if fc.is_finite() && fc < f {
                let gain = f - fc;
                w = candidate;
                f = fc;
                improved = true;
                if gain < options.tolerance {
                    converged = true;
                }
                break;
            }
            step *= 0.5;
        }

        if !improved {
            // No descent direction at any step length: local optimum on the
            // simplex (or a kink of a piecewise-linear objective).
            converged = true;
        }
        if converged {
            break;
        }
    }

    Ok(SolverOutcome {
        weights: w,
        objective: f,
        converged,
        iterations,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------
    // 1. Quadratic bowl with an interior simplex minimum
    // ------------------------------------------------------------------
    #[test]
    fn test_quadratic_objective() {
        let target = [0.2, 0.8];
        let outcome = minimize_on_simplex(
            |w| {
                Ok(w.iter()
                    .zip(&target)
                    .map(|(wi, ti)| (wi - ti).powi(2))
                    .sum())
            },
            2,
            &SolverOptions::default(),
        )
        .unwrap();

        assert!(outcome.converged);
        assert!((outcome.weights[0] - 0.2).abs() < 1e-3, "{:?}", outcome);
        assert!((outcome.weights[1] - 0.8).abs() < 1e-3);
        assert!(outcome.objective < 1e-6);
    }

    // ------------------------------------------------------------------
    // 2. Solution stays on the simplex
    // ------------------------------------------------------------------
    #[test]
    fn test_solution_feasible() {
        // Minimum outside the long-only set pushes the solver to a vertex
        let outcome = minimize_on_simplex(
            |w| Ok((w[0] + 1.0).powi(2) + (w[1] - 2.0).powi(2)),
            2,
            &SolverOptions::default(),
        )
        .unwrap();

        let total: f64 = outcome.weights.iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(outcome.weights.iter().all(|w| *w >= 0.0));
        assert!(outcome.weights[1] > 0.99);
    }

    // ------------------------------------------------------------------
    // 3. Exhausted budget reports converged = false
    // ------------------------------------------------------------------
    #[test]
    fn test_budget_exhaustion_flagged() {
        let options = SolverOptions {
            max_iterations: 2,
            tolerance: 0.0,
            ..SolverOptions::default()
        };
        // Smooth objective that keeps improving past two iterations
        let outcome = minimize_on_simplex(
            |w| Ok((w[0] - 0.9).powi(2) + (w[1] - 0.1).powi(2)),
            2,
            &options,
        )
        .unwrap();
        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 2);
    }

    // ------------------------------------------------------------------
    // 4. Non-finite objective at the start is an error
    // ------------------------------------------------------------------
    #[test]
    fn test_infeasible_start() {
        let res = minimize_on_simplex(|_| Ok(f64::NAN), 3, &SolverOptions::default());
        assert!(matches!(res, Err(RiskError::NumericalInstability(_))));
    }

    // ------------------------------------------------------------------
    // 5. Projection helper
    // ------------------------------------------------------------------
    #[test]
    fn test_project_simplex() {
        let mut w = vec![0.5, -0.25, 0.25];
        project_simplex(&mut w);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(w[1], 0.0);

        let mut zeros = vec![0.0, 0.0];
        project_simplex(&mut zeros);
        assert_eq!(zeros, vec![0.5, 0.5]);
    }
}
