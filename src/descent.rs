//! The gradient descent optimizer.

use std::ops::RangeInclusive;

use derive_builder::Builder;
use derive_getters::{Dissolve, Getters};
use derive_more::IsVariant;
use rand::{distributions::Uniform, prelude::*};
use tracing::{debug, instrument, trace};

use crate::{
    config::ConfigError,
    oracle::{ObjectiveOracle, OracleError},
    schedule::{StepDecision, StepSchedule},
    types::{IterationLimit, MomentumCoefficient, StepSize, Tolerance},
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Gradient descent configuration parameters.
///
/// Momentum is only defined for the decay schedules;
/// pairing it with the line-search schedule
/// is rejected when the configuration is built.
///
/// # Examples
///
/// ```
/// use gradient_descent::{ConfigBuilder, DecayRate, MomentumCoefficient, StepSchedule};
///
/// let config = ConfigBuilder::default()
///     .schedule(StepSchedule::InverseDecay {
///         rate: DecayRate::default(),
///     })
///     .momentum(Some(MomentumCoefficient::default()))
///     .build()
///     .unwrap();
/// assert!(config.momentum.is_some());
/// ```
#[derive(Clone, Debug, Default, PartialEq, Builder)]
#[builder(build_fn(validate = "Self::validate", error = "ConfigError"))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Config {
    /// Initial step size `α₀`.
    #[builder(default)]
    pub initial_step_size: StepSize,
    /// Step-size schedule.
    #[builder(default)]
    pub schedule: StepSchedule,
    /// Momentum coefficient;
    /// `None` selects the plain update rule.
    #[builder(default)]
    pub momentum: Option<MomentumCoefficient>,
    /// Stopping criteria.
    #[builder(default)]
    pub stopping: StoppingCriteria,
}

/// When a minimize run stops.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StoppingCriteria {
    /// Iteration budget.
    pub max_iterations: IterationLimit,
    /// Tolerance on the squared step length between consecutive iterates,
    /// the primary convergence signal.
    pub step_tolerance: Tolerance,
    /// Optional tolerance on the objective change between consecutive iterates.
    ///
    /// Disabled by default:
    /// this criterion historically under-performs the step-length criterion.
    pub value_tolerance: Option<Tolerance>,
}

/// Why a minimize run stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, IsVariant)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Termination {
    /// The squared step length fell below tolerance.
    StepConverged,
    /// The objective change between iterates fell below tolerance.
    ValueConverged,
    /// The iteration budget ran out.
    IterationLimitReached,
    /// Backtracking found no admissible step at or above its floor.
    LineSearchFailed,
}

/// Mutable state of one minimize run.
#[derive(Clone, Debug, Getters)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationState {
    /// Latest iterate.
    current: Vec<f64>,
    /// Iterate the latest update started from.
    previous: Vec<f64>,
    /// Step size applied by the latest iteration,
    /// 0 before the first.
    last_step_size: f64,
    /// Completed iterations.
    iterations: usize,
    /// Squared step length of the latest update,
    /// `None` before the first iteration.
    residual: Option<f64>,
    /// Why the run stopped,
    /// `None` while running.
    termination: Option<Termination>,
}

impl IterationState {
    fn starting(x0: Vec<f64>) -> Self {
        Self {
            previous: x0.clone(),
            current: x0,
            last_step_size: 0.0,
            iterations: 0,
            residual: None,
            termination: None,
        }
    }
}

/// Snapshot of a finished run,
/// for reporting.
#[derive(Clone, Debug, PartialEq, Dissolve)]
#[dissolve(rename = "into_parts")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    point: Vec<f64>,
    residual: Option<f64>,
    iterations: usize,
    termination: Termination,
}

impl Summary {
    /// Return the final iterate of the run.
    pub fn point(&self) -> &[f64] {
        &self.point
    }

    /// Return the squared step length of the final iteration,
    /// `None` if the run stopped before completing a step.
    pub fn residual(&self) -> Option<f64> {
        self.residual
    }

    /// Return the number of iterations the run used.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Return why the run stopped.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Return whether the run stopped on a convergence criterion,
    /// as opposed to running out of budget
    /// or a failed line search.
    pub fn converged(&self) -> bool {
        self.termination.is_step_converged() || self.termination.is_value_converged()
    }
}

/// A gradient descent optimizer.
///
/// # Examples
///
/// ```
/// use gradient_descent::{Config, FnOracle};
///
/// let oracle = FnOracle::new(
///     |point: &[f64]| point.iter().map(|x| x.powi(2)).sum(),
///     |point: &[f64], i| 2.0 * point[i],
///     2,
/// );
///
/// let mut optimizer = Config::default().start(oracle);
/// let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();
/// assert!(summary.converged());
/// ```
#[derive(Clone, Debug, Getters, Dissolve)]
#[dissolve(rename = "into_parts")]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GradientDescent<O> {
    /// Optimizer configuration.
    config: Config,

    /// State of the latest run.
    state: IterationState,

    /// Objective oracle to minimize.
    oracle: O,
}

impl Config {
    /// Return a new `Config` if the combination is valid.
    pub fn new(
        initial_step_size: StepSize,
        schedule: StepSchedule,
        momentum: Option<MomentumCoefficient>,
        stopping: StoppingCriteria,
    ) -> Result<Self, ConfigError> {
        if momentum.is_some() && schedule.is_backtracking_line_search() {
            return Err(ConfigError::MomentumWithLineSearch);
        }
        Ok(Self {
            initial_step_size,
            schedule,
            momentum,
            stopping,
        })
    }

    /// Return this configuration
    /// running against the given oracle.
    pub fn start<O>(self, oracle: O) -> GradientDescent<O>
    where
        O: ObjectiveOracle,
    {
        GradientDescent {
            config: self,
            state: IterationState::starting(Vec::new()),
            oracle,
        }
    }
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), ConfigError> {
        let momentum = matches!(self.momentum, Some(Some(_)));
        let line_search = matches!(
            self.schedule,
            Some(StepSchedule::BacktrackingLineSearch { .. })
        );
        if momentum && line_search {
            return Err(ConfigError::MomentumWithLineSearch);
        }
        Ok(())
    }
}

impl<O> GradientDescent<O>
where
    O: ObjectiveOracle,
{
    /// Minimize the objective starting from `x0`.
    ///
    /// The iteration state is reset at entry,
    /// so one optimizer can run repeatedly
    /// without carrying anything over between runs.
    /// Oracle failures are fatal and abort the run.
    #[instrument(skip(self, x0), fields(dimension = x0.len()))]
    pub fn minimize(&mut self, x0: Vec<f64>) -> Result<Summary, OracleError> {
        self.state = IterationState::starting(x0);
        let max_iterations = self.config.stopping.max_iterations.into_inner();
        let step_tolerance = self.config.stopping.step_tolerance.into_inner();
        let value_tolerance = self
            .config
            .stopping
            .value_tolerance
            .map(Tolerance::into_inner);

        let termination = loop {
            if self.state.iterations >= max_iterations {
                break Termination::IterationLimitReached;
            }
            self.state.iterations += 1;
            let k = self.state.iterations - 1;
            self.state.previous.clone_from(&self.state.current);

            let gradient = self.gradient(&self.state.previous)?;
            let decision = self.config.schedule.step_size(
                k,
                self.config.initial_step_size,
                &self.state.previous,
                &gradient,
                &self.oracle,
            )?;
            let step_size = match decision {
                StepDecision::Accepted(alpha) => alpha,
                StepDecision::Underflowed => break Termination::LineSearchFailed,
            };

            if let Some(beta) = self.config.momentum {
                // `last_step_size` is 0 before the first iteration,
                // so the first update is a plain gradient step.
                let pre_step = beta.into_inner() * self.state.last_step_size;
                for (x, g) in self.state.current.iter_mut().zip(&gradient) {
                    *x -= pre_step * g;
                }
            }
            for (x, g) in self.state.current.iter_mut().zip(&gradient) {
                *x -= step_size * g;
            }

            let residual = self
                .state
                .previous
                .iter()
                .zip(&self.state.current)
                .map(|(p, x)| (x - p) * (x - p))
                .sum::<f64>();
            self.state.residual = Some(residual);
            self.state.last_step_size = step_size;
            trace!(iteration = k, step_size, residual, "applied gradient step");

            if residual < step_tolerance {
                break Termination::StepConverged;
            }
            if let Some(tolerance) = value_tolerance {
                let change = (self.oracle.evaluate(&self.state.previous)?
                    - self.oracle.evaluate(&self.state.current)?)
                .abs();
                if change < tolerance {
                    break Termination::ValueConverged;
                }
            }
        };

        self.state.termination = Some(termination);
        debug!(
            ?termination,
            iterations = self.state.iterations,
            "minimize finished"
        );
        Ok(self.summary(termination))
    }

    /// Minimize the objective
    /// starting from a point sampled uniformly
    /// within the given per-coordinate bounds.
    ///
    /// # Examples
    ///
    /// ```
    /// use gradient_descent::{Config, FnOracle};
    /// use rand::{rngs::SmallRng, SeedableRng};
    ///
    /// let oracle = FnOracle::new(
    ///     |point: &[f64]| point.iter().map(|x| x.powi(2)).sum(),
    ///     |point: &[f64], i| 2.0 * point[i],
    ///     2,
    /// );
    ///
    /// let mut optimizer = Config::default().start(oracle);
    /// let summary = optimizer
    ///     .minimize_within(
    ///         std::iter::repeat(-10.0..=10.0).take(2),
    ///         &mut SmallRng::seed_from_u64(0),
    ///     )
    ///     .unwrap();
    /// assert!(summary.iterations() <= 100);
    /// ```
    pub fn minimize_within<B, R>(&mut self, bounds: B, rng: &mut R) -> Result<Summary, OracleError>
    where
        B: IntoIterator<Item = RangeInclusive<f64>>,
        R: Rng,
    {
        let x0 = bounds
            .into_iter()
            .map(|range| {
                let (start, end) = range.into_inner();
                Uniform::new_inclusive(start, end).sample(rng)
            })
            .collect();
        self.minimize(x0)
    }

    /// Return the best point discovered by the latest run.
    pub fn best_point(&self) -> Vec<f64> {
        self.state.current.clone()
    }

    /// Return the value of the best point,
    /// evaluating it with the oracle.
    pub fn best_point_value(&self) -> Result<f64, OracleError> {
        self.oracle.evaluate(&self.state.current)
    }

    /// Return the squared step length of the latest iteration,
    /// `None` before any iteration has completed.
    pub fn residual(&self) -> Option<f64> {
        self.state.residual
    }

    /// Return the number of iterations the latest run used.
    pub fn iterations(&self) -> usize {
        self.state.iterations
    }

    /// Return why the latest run stopped,
    /// `None` if no run has finished.
    pub fn termination(&self) -> Option<Termination> {
        self.state.termination
    }

    fn gradient(&self, point: &[f64]) -> Result<Vec<f64>, OracleError> {
        (0..point.len())
            .map(|i| self.oracle.partial_derivative(point, i))
            .collect()
    }

    fn summary(&self, termination: Termination) -> Summary {
        Summary {
            point: self.state.current.clone(),
            residual: self.state.residual,
            iterations: self.state.iterations,
            termination,
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;
    use rand::{rngs::SmallRng, SeedableRng};
    use test_strategy::proptest;

    use crate::{
        types::{DecayRate, StepSizeFloor, SufficientDecreaseParameter},
        FnOracle,
    };

    use super::*;

    fn sphere() -> impl ObjectiveOracle {
        FnOracle::new(
            |point: &[f64]| point.iter().map(|x| x.powi(2)).sum(),
            |point: &[f64], i| 2.0 * point[i],
            2,
        )
    }

    fn config(schedule: StepSchedule, momentum: Option<MomentumCoefficient>) -> Config {
        Config::new(
            StepSize::new(0.2).unwrap(),
            schedule,
            momentum,
            StoppingCriteria {
                max_iterations: IterationLimit::new(100).unwrap(),
                step_tolerance: Tolerance::new(1e-7).unwrap(),
                value_tolerance: None,
            },
        )
        .unwrap()
    }

    fn exponential() -> StepSchedule {
        StepSchedule::ExponentialDecay {
            rate: DecayRate::new(0.2).unwrap(),
        }
    }

    fn inverse() -> StepSchedule {
        StepSchedule::InverseDecay {
            rate: DecayRate::new(0.2).unwrap(),
        }
    }

    fn backtracking() -> StepSchedule {
        StepSchedule::BacktrackingLineSearch {
            c_1: SufficientDecreaseParameter::new(0.2).unwrap(),
            rate: crate::types::BacktrackingRate::new(0.5).unwrap(),
            floor: StepSizeFloor::new(1e-6).unwrap(),
        }
    }

    #[test]
    fn exponential_decay_converges_on_step_length() {
        let mut optimizer = config(exponential(), None).start(sphere());
        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::StepConverged);
        assert!(summary.iterations() < 100);
        assert!(summary.residual().unwrap() < 1e-7);
        // The exponentially shrinking steps stall the iterate
        // well before the minimizer at the origin.
        for x in summary.point() {
            assert!(x.abs() < 0.1);
        }
    }

    #[test]
    fn inverse_decay_converges_on_step_length() {
        let mut optimizer = config(inverse(), None).start(sphere());
        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::StepConverged);
        assert!(summary.iterations() < 100);
        assert!(summary.residual().unwrap() < 1e-7);
        for x in summary.point() {
            assert!(x.abs() < 1e-2);
        }
    }

    #[test]
    fn backtracking_drives_sphere_to_the_minimum() {
        let mut optimizer = config(backtracking(), None).start(sphere());
        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::StepConverged);
        assert!(summary.iterations() < 100);
        for x in summary.point() {
            assert!(x.abs() < 1e-3);
        }
        assert_abs_diff_eq!(optimizer.best_point_value().unwrap(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn momentum_reaches_closer_than_plain_inverse_decay() {
        let mut plain = config(inverse(), None).start(sphere());
        let plain_summary = plain.minimize(vec![1.0, 1.0]).unwrap();

        let mut accelerated =
            config(inverse(), Some(MomentumCoefficient::new(0.8).unwrap())).start(sphere());
        let summary = accelerated.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::StepConverged);
        assert!(summary.iterations() < 100);
        for (x, p) in summary.point().iter().zip(plain_summary.point()) {
            assert!(x.abs() < 2e-3);
            assert!(x.abs() < p.abs());
        }
    }

    #[test]
    fn first_momentum_iteration_equals_a_plain_gradient_step() {
        let one_iteration = StoppingCriteria {
            max_iterations: IterationLimit::new(1).unwrap(),
            step_tolerance: Tolerance::new(1e-12).unwrap(),
            value_tolerance: None,
        };
        let mut plain = Config::new(
            StepSize::new(0.2).unwrap(),
            exponential(),
            None,
            one_iteration.clone(),
        )
        .unwrap()
        .start(sphere());
        let mut accelerated = Config::new(
            StepSize::new(0.2).unwrap(),
            exponential(),
            Some(MomentumCoefficient::new(0.8).unwrap()),
            one_iteration,
        )
        .unwrap()
        .start(sphere());

        let plain_summary = plain.minimize(vec![1.0, 1.0]).unwrap();
        let accelerated_summary = accelerated.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(plain_summary.point(), accelerated_summary.point());
    }

    #[test]
    fn value_tolerance_stops_the_run_when_enabled() {
        let mut optimizer = Config::new(
            StepSize::new(0.2).unwrap(),
            exponential(),
            None,
            StoppingCriteria {
                max_iterations: IterationLimit::new(100).unwrap(),
                step_tolerance: Tolerance::new(1e-12).unwrap(),
                value_tolerance: Some(Tolerance::new(10.0).unwrap()),
            },
        )
        .unwrap()
        .start(sphere());
        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::ValueConverged);
        assert_eq!(summary.iterations(), 1);
    }

    #[test]
    fn line_search_failure_stops_early_with_the_best_point_so_far() {
        // The claimed derivative points uphill,
        // so no step admits sufficient decrease.
        let lying = FnOracle::new(|point: &[f64]| point[0], |_: &[f64], _| -1.0, 1);
        let mut optimizer = config(backtracking(), None).start(lying);
        let summary = optimizer.minimize(vec![1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::LineSearchFailed);
        assert!(summary.iterations() < 100);
        assert_eq!(summary.point(), &[1.0]);
        assert_eq!(summary.residual(), None);
    }

    #[test]
    fn exhausted_budget_is_reported() {
        let mut optimizer = Config::new(
            StepSize::new(0.2).unwrap(),
            inverse(),
            None,
            StoppingCriteria {
                max_iterations: IterationLimit::new(3).unwrap(),
                step_tolerance: Tolerance::new(1e-12).unwrap(),
                value_tolerance: None,
            },
        )
        .unwrap()
        .start(sphere());
        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary.termination(), Termination::IterationLimitReached);
        assert_eq!(summary.iterations(), 3);
    }

    #[test]
    fn accessors_are_idempotent_and_match_the_summary() {
        let mut optimizer = config(exponential(), None).start(sphere());
        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(optimizer.best_point(), summary.point());
        assert_eq!(optimizer.best_point(), summary.point());
        assert_eq!(optimizer.residual(), summary.residual());
        assert_eq!(optimizer.residual(), summary.residual());
        assert_eq!(optimizer.iterations(), summary.iterations());
        assert_eq!(optimizer.termination(), Some(summary.termination()));
        assert_eq!(
            optimizer.best_point_value().unwrap(),
            summary.point().iter().map(|x| x.powi(2)).sum::<f64>()
        );
    }

    #[test]
    fn rerunning_resets_state_and_reproduces_the_result() {
        let mut optimizer = config(inverse(), None).start(sphere());
        let first = optimizer.minimize(vec![1.0, 1.0]).unwrap();
        let second = optimizer.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn zero_dimensional_point_converges_immediately() {
        let empty = FnOracle::new(|_: &[f64]| 0.0, |_: &[f64], _| 0.0, 0);
        let mut optimizer = config(exponential(), None).start(empty);
        let summary = optimizer.minimize(Vec::new()).unwrap();

        assert_eq!(summary.termination(), Termination::StepConverged);
        assert_eq!(summary.iterations(), 1);
    }

    #[test]
    fn oracle_failure_aborts_the_run() {
        struct FailingOracle;

        impl ObjectiveOracle for FailingOracle {
            fn evaluate(&self, _point: &[f64]) -> Result<f64, OracleError> {
                Err(OracleError::Evaluation("undefined".to_owned()))
            }

            fn partial_derivative(
                &self,
                _point: &[f64],
                _coordinate: usize,
            ) -> Result<f64, OracleError> {
                Err(OracleError::Evaluation("undefined".to_owned()))
            }
        }

        let mut optimizer = config(exponential(), None).start(FailingOracle);
        assert_eq!(
            optimizer.minimize(vec![1.0, 1.0]),
            Err(OracleError::Evaluation("undefined".to_owned()))
        );
    }

    #[test]
    fn degenerate_bounds_pin_the_sampled_initial_point() {
        let mut sampled = config(exponential(), None).start(sphere());
        let mut direct = config(exponential(), None).start(sphere());

        let summary = sampled
            .minimize_within(
                std::iter::repeat(1.0..=1.0).take(2),
                &mut SmallRng::seed_from_u64(0),
            )
            .unwrap();
        let expected = direct.minimize(vec![1.0, 1.0]).unwrap();

        assert_eq!(summary, expected);
    }

    #[proptest]
    fn iterations_never_exceed_the_limit(
        #[strategy(1e-3..1.0f64)] alpha: f64,
        #[strategy(0.01..1.0f64)] rate: f64,
        #[strategy(1usize..40)] max_iterations: usize,
        inverse_decay: bool,
    ) {
        let schedule = if inverse_decay {
            StepSchedule::InverseDecay {
                rate: DecayRate::new(rate).unwrap(),
            }
        } else {
            StepSchedule::ExponentialDecay {
                rate: DecayRate::new(rate).unwrap(),
            }
        };
        let mut optimizer = Config::new(
            StepSize::new(alpha).unwrap(),
            schedule,
            None,
            StoppingCriteria {
                max_iterations: IterationLimit::new(max_iterations).unwrap(),
                step_tolerance: Tolerance::new(1e-12).unwrap(),
                value_tolerance: None,
            },
        )
        .unwrap()
        .start(sphere());

        let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();
        prop_assert!(summary.iterations() <= max_iterations);
    }
}
