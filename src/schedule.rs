//! Step-size schedules.

use derive_more::IsVariant;

use crate::{
    oracle::{ObjectiveOracle, OracleError},
    types::{BacktrackingRate, DecayRate, StepSize, StepSizeFloor, SufficientDecreaseParameter},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the optimizer picks the step size of each iteration.
///
/// The decay variants are deterministic functions of the iteration index,
/// independent of function values.
/// The backtracking variant adapts to the objective
/// and is the only variant that can fail.
#[derive(Clone, Debug, PartialEq, IsVariant)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
pub enum StepSchedule {
    /// `α_k = α₀ · e^(−λk)`.
    ExponentialDecay {
        /// Decay rate `λ`.
        rate: DecayRate,
    },
    /// `α_k = α₀ / (1 + λk)`.
    InverseDecay {
        /// Decay rate `λ`.
        rate: DecayRate,
    },
    /// Backtracking line search:
    /// shrink α from α₀
    /// until the sufficient decrease condition holds,
    /// giving up once α falls below `floor`.
    BacktrackingLineSearch {
        /// Sufficient decrease parameter `c_1`.
        c_1: SufficientDecreaseParameter,
        /// Multiplier applied to α after each rejected trial.
        rate: BacktrackingRate,
        /// Safeguard floor under which the search gives up.
        floor: StepSizeFloor,
    },
}

impl Default for StepSchedule {
    fn default() -> Self {
        Self::ExponentialDecay {
            rate: DecayRate::default(),
        }
    }
}

/// Outcome of asking a schedule for the step size of one iteration.
#[derive(Clone, Copy, Debug, PartialEq, IsVariant)]
pub enum StepDecision {
    /// An admissible step size.
    Accepted(f64),
    /// The backtracking search fell below its floor
    /// without finding an admissible step.
    Underflowed,
}

impl StepSchedule {
    /// Return the step size for the iteration with zero-based index `k`,
    /// so the first iteration of every schedule steps by exactly `α₀`.
    ///
    /// The backtracking variant searches along the negative `gradient`
    /// from `point`,
    /// querying `oracle` for trial values,
    /// and reports [`StepDecision::Underflowed`]
    /// when no step at or above its floor decreases the objective enough.
    /// Oracle failures abort the search.
    pub fn step_size<O>(
        &self,
        k: usize,
        initial: StepSize,
        point: &[f64],
        gradient: &[f64],
        oracle: &O,
    ) -> Result<StepDecision, OracleError>
    where
        O: ObjectiveOracle,
    {
        let alpha_0 = initial.into_inner();
        match self {
            Self::ExponentialDecay { rate } => Ok(StepDecision::Accepted(
                alpha_0 * (-rate.into_inner() * k as f64).exp(),
            )),
            Self::InverseDecay { rate } => Ok(StepDecision::Accepted(
                alpha_0 / (1.0 + rate.into_inner() * k as f64),
            )),
            Self::BacktrackingLineSearch { c_1, rate, floor } => {
                backtrack(*c_1, *rate, *floor, alpha_0, point, gradient, oracle)
            }
        }
    }
}

/// Shrink α until the sufficient decrease condition,
/// also known as the Armijo rule,
/// holds for the steepest descent direction:
/// `f(x) − f(x − α·∇f(x)) ≥ c_1 · α · ‖∇f(x)‖²`.
/// Equality counts as satisfied.
fn backtrack<O>(
    c_1: SufficientDecreaseParameter,
    rate: BacktrackingRate,
    floor: StepSizeFloor,
    alpha_0: f64,
    point: &[f64],
    gradient: &[f64],
    oracle: &O,
) -> Result<StepDecision, OracleError>
where
    O: ObjectiveOracle,
{
    let value = oracle.evaluate(point)?;
    let c_1_times_gradient_norm_squared =
        c_1.into_inner() * gradient.iter().map(|g| g * g).sum::<f64>();

    let mut alpha = alpha_0;
    while alpha >= floor.into_inner() {
        let trial = point
            .iter()
            .zip(gradient)
            .map(|(x, g)| x - alpha * g)
            .collect::<Vec<_>>();
        if value - oracle.evaluate(&trial)? >= alpha * c_1_times_gradient_norm_squared {
            return Ok(StepDecision::Accepted(alpha));
        }
        alpha *= rate.into_inner();
    }
    Ok(StepDecision::Underflowed)
}
