/// optimizer.rs — Bounded, constrained Nelder-Mead minimiser
///
/// ─────────────────────────────────────────────────────────────────────────
/// MATHEMATICAL SPECIFICATION
/// ─────────────────────────────────────────────────────────────────────────
///
///   minimise  f(x)   subject to   l ≤ x ≤ u,   g_k(x) ≥ 0  (or > 0 if strict)
///
///   Simplex of n+1 vertices, centroid x̄ of the best n:
///       reflect     x_r = x̄ + 1.0 · (x̄ − x_worst)
///       expand      x_e = x̄ + 2.0 · (x_r − x̄)
///       contract    x_c = x̄ + 0.5 · (x_r − x̄)        outside (f_r < f_worst)
///                   x_c = x̄ + 0.5 · (x_worst − x̄)    inside
///       shrink      x_i = x_best + 0.5 · (x_i − x_best)
///
///   Every trial vertex is projected onto the box [l, u].  Scores:
///       Σ violation > 0     →  INFEASIBLE_PENALTY · (1 + Σ violation)
///       f undefined / NaN   →  INFEASIBLE_PENALTY
///   so the simplex never sees NaN.
///
///   Stop when  |f_worst − f_best| ≤ f_tol · (1 + |f_best|)
///         and  max_i ‖(x_i − x_best) / (u − l)‖₂ ≤ x_tol,
///   or after max_iterations.
/// ─────────────────────────────────────────────────────────────────────────
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GarchError, Result};

/// Objective value assigned to infeasible points.
pub const INFEASIBLE_PENALTY: f64 = 1e12;

/// Box constraints `lower <= x <= upper`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoxConstraints {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl BoxConstraints {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        if lower.is_empty() || lower.len() != upper.len() {
            return Err(GarchError::InvalidParameter(
                "bounds require same non-zero lower/upper dimensions".to_string(),
            ));
        }
        for i in 0..lower.len() {
            if !lower[i].is_finite() || !upper[i].is_finite() || lower[i] >= upper[i] {
                return Err(GarchError::InvalidParameter(format!(
                    "invalid bound at index {i}: [{}, {}]",
                    lower[i], upper[i]
                )));
            }
        }
        Ok(Self { lower, upper })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.lower.len()
    }

    #[inline]
    pub fn width(&self, i: usize) -> f64 {
        self.upper[i] - self.lower[i]
    }

    pub fn clamp(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .enumerate()
            .map(|(i, v)| v.clamp(self.lower[i], self.upper[i]))
            .collect()
    }

    pub fn contains(&self, x: &[f64]) -> bool {
        x.len() == self.dimension()
            && x
                .iter()
                .enumerate()
                .all(|(i, &v)| v >= self.lower[i] && v <= self.upper[i])
    }

    /// Indices whose coordinate lies within `eps · width` of either bound.
    pub fn active(&self, x: &[f64], eps: f64) -> Vec<usize> {
        x.iter()
            .enumerate()
            .filter(|&(i, &v)| {
                let tol = eps.max(1e-12) * self.width(i);
                (v - self.lower[i]).abs() <= tol || (self.upper[i] - v).abs() <= tol
            })
            .map(|(i, _)| i)
            .collect()
    }

    /// Euclidean distance after scaling each axis by its width.
    fn scaled_distance(&self, a: &[f64], b: &[f64]) -> f64 {
        a.iter()
            .zip(b)
            .enumerate()
            .map(|(i, (x, y))| ((x - y) / self.width(i)).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// Nonlinear inequality constraint: every residual must be ≥ 0
/// (> 0 when `strict`).
pub struct Inequality<'a> {
    pub name: &'static str,
    pub strict: bool,
    residuals: Box<dyn Fn(&[f64]) -> Vec<f64> + 'a>,
}

impl<'a> Inequality<'a> {
    pub fn non_negative(name: &'static str, f: impl Fn(&[f64]) -> Vec<f64> + 'a) -> Self {
        Self { name, strict: false, residuals: Box::new(f) }
    }

    pub fn positive(name: &'static str, f: impl Fn(&[f64]) -> Vec<f64> + 'a) -> Self {
        Self { name, strict: true, residuals: Box::new(f) }
    }

    pub fn residuals(&self, x: &[f64]) -> Vec<f64> {
        (self.residuals)(x)
    }

    /// Total shortfall below the feasible region; 0 when satisfied.
    pub fn violation(&self, x: &[f64]) -> f64 {
        self.residuals(x)
            .into_iter()
            .map(|r| {
                if r.is_nan() {
                    1.0
                } else if self.strict && r <= 0.0 {
                    -r + f64::EPSILON
                } else {
                    (-r).max(0.0)
                }
            })
            .sum()
    }
}

impl std::fmt::Debug for Inequality<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inequality")
            .field("name", &self.name)
            .field("strict", &self.strict)
            .finish()
    }
}

/// Optimizer termination reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Simplex values and vertices both within tolerance.
    Tolerance,
    MaxIterations,
    NumericalFailure,
}

/// Convergence metadata for one optimization run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceInfo {
    pub iterations: usize,
    pub objective_evaluations: usize,
    /// |f_worst − f_best| at termination.
    pub value_spread: f64,
    /// Largest width-scaled vertex distance from the best vertex.
    pub simplex_size: f64,
    pub converged: bool,
    pub reason: TerminationReason,
}

#[derive(Debug, Clone, Copy)]
pub struct NelderMeadOptions {
    pub max_iterations: usize,
    /// Initial simplex edge as a fraction of each bound width.
    pub initial_step: f64,
    pub reflection: f64,
    pub expansion: f64,
    pub contraction: f64,
    pub shrink: f64,
    /// Relative tolerance on the simplex value spread.
    pub f_tolerance: f64,
    /// Tolerance on the width-scaled simplex size.
    pub x_tolerance: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            initial_step: 0.08,
            reflection: 1.0,
            expansion: 2.0,
            contraction: 0.5,
            shrink: 0.5,
            f_tolerance: 1e-10,
            x_tolerance: 1e-7,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OptimisationResult {
    pub x: Vec<f64>,
    pub objective: f64,
    pub convergence: ConvergenceInfo,
}

/// Counts evaluations and folds bounds, constraints and domain failures into
/// one finite value.
struct Penalised<'c, 'a, F> {
    constraints: &'c [Inequality<'a>],
    objective: F,
    evaluations: usize,
}

impl<F> Penalised<'_, '_, F>
where
    F: FnMut(&[f64]) -> Option<f64>,
{
    fn eval(&mut self, x: &[f64]) -> f64 {
        self.evaluations += 1;
        let violation: f64 = self.constraints.iter().map(|c| c.violation(x)).sum();
        if violation > 0.0 {
            return INFEASIBLE_PENALTY * (1.0 + violation);
        }
        match (self.objective)(x) {
            Some(v) if v.is_finite() => v,
            _ => INFEASIBLE_PENALTY,
        }
    }
}

/// Minimise `objective` from `initial` inside `bounds` subject to
/// `constraints`.
///
/// `objective` returns `None` where it is undefined.  The starting point must
/// be feasible with a finite objective; the returned point is never worse
/// than it.
pub fn nelder_mead<F>(
    initial: &[f64],
    bounds: &BoxConstraints,
    constraints: &[Inequality<'_>],
    options: NelderMeadOptions,
    objective: F,
) -> Result<OptimisationResult>
where
    F: FnMut(&[f64]) -> Option<f64>,
{
    let dim = bounds.dimension();
    if initial.len() != dim {
        return Err(GarchError::InvalidParameter(format!(
            "initial point has {} coordinates, bounds have {dim}",
            initial.len()
        )));
    }
    if options.max_iterations == 0 {
        return Err(GarchError::InvalidParameter(
            "max_iterations must be positive".to_string(),
        ));
    }

    let mut f = Penalised { constraints, objective, evaluations: 0 };

    let x0 = bounds.clamp(initial);
    let f0 = f.eval(&x0);
    if f0 >= INFEASIBLE_PENALTY {
        return Err(GarchError::InvalidParameter(
            "initial point is infeasible or outside the objective domain".to_string(),
        ));
    }

    let mut simplex = vec![x0.clone()];
    let mut values = vec![f0];
    for d in 0..dim {
        let step = bounds.width(d) * options.initial_step.max(1e-4);
        let mut x = x0.clone();
        x[d] += step;
        if x[d] > bounds.upper[d] {
            x[d] = x0[d] - step;
        }
        let x = bounds.clamp(&x);
        values.push(f.eval(&x));
        simplex.push(x);
    }

    let mut iterations = 0usize;
    let mut reason = TerminationReason::MaxIterations;
    let mut converged = false;
    let mut spread = f64::INFINITY;
    let mut size = f64::INFINITY;

    for iter in 0..options.max_iterations {
        iterations = iter + 1;

        let mut order: Vec<usize> = (0..simplex.len()).collect();
        order.sort_by(|&i, &j| values[i].total_cmp(&values[j]));
        simplex = order.iter().map(|&i| simplex[i].clone()).collect();
        values = order.iter().map(|&i| values[i]).collect();

        let best = values[0];
        if !best.is_finite() {
            reason = TerminationReason::NumericalFailure;
            break;
        }
        spread = (values[dim] - best).abs();
        size = simplex
            .iter()
            .skip(1)
            .map(|x| bounds.scaled_distance(x, &simplex[0]))
            .fold(0.0_f64, f64::max);

        if spread <= options.f_tolerance * (1.0 + best.abs()) && size <= options.x_tolerance {
            converged = true;
            reason = TerminationReason::Tolerance;
            break;
        }

        let centroid: Vec<f64> = (0..dim)
            .map(|d| simplex.iter().take(dim).map(|x| x[d]).sum::<f64>() / dim as f64)
            .collect();
        let toward = |coef: f64, target: &[f64]| -> Vec<f64> {
            let x: Vec<f64> = (0..dim)
                .map(|d| centroid[d] + coef * (target[d] - centroid[d]))
                .collect();
            bounds.clamp(&x)
        };

        let worst = simplex[dim].clone();
        let xr = toward(-options.reflection, &worst);
        let fr = f.eval(&xr);

        if fr < values[0] {
            let xe = toward(options.expansion, &xr);
            let fe = f.eval(&xe);
            if fe < fr {
                simplex[dim] = xe;
                values[dim] = fe;
            } else {
                simplex[dim] = xr;
                values[dim] = fr;
            }
            continue;
        }

        if fr < values[dim - 1] {
            simplex[dim] = xr;
            values[dim] = fr;
            continue;
        }

        // Outside contraction when the reflection beat the worst vertex,
        // inside contraction otherwise.
        let (xc, fc, accept) = if fr < values[dim] {
            let xc = toward(options.contraction, &xr);
            let fc = f.eval(&xc);
            (xc, fc, fc <= fr)
        } else {
            let xc = toward(options.contraction, &worst);
            let fc = f.eval(&xc);
            (xc, fc, fc < values[dim])
        };
        if accept {
            simplex[dim] = xc;
            values[dim] = fc;
            continue;
        }

        for i in 1..=dim {
            let shrunk: Vec<f64> = (0..dim)
                .map(|d| simplex[0][d] + options.shrink * (simplex[i][d] - simplex[0][d]))
                .collect();
            simplex[i] = bounds.clamp(&shrunk);
            values[i] = f.eval(&simplex[i]);
        }
    }

    let best = (0..values.len())
        .min_by(|&i, &j| values[i].total_cmp(&values[j]))
        .unwrap_or(0);

    let convergence = ConvergenceInfo {
        iterations,
        objective_evaluations: f.evaluations,
        value_spread: spread,
        simplex_size: size,
        converged,
        reason,
    };
    debug!(
        "Nelder-Mead stopped: reason={:?} iterations={} evaluations={} spread={:.3e} size={:.3e}",
        convergence.reason, convergence.iterations, convergence.objective_evaluations,
        convergence.value_spread, convergence.simplex_size
    );

    Ok(OptimisationResult {
        x: simplex[best].clone(),
        objective: values[best],
        convergence,
    })
}
