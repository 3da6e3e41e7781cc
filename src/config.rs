//! The flat configuration surface consumed at construction.
//!
//! An external loader produces [`Options`];
//! [`TryFrom`] turns them into a validated [`Config`],
//! so no invalid parameter can reach a run.

use crate::{
    descent::{Config, StoppingCriteria},
    schedule::StepSchedule,
    types::{
        BacktrackingRate, DecayRate, InvalidBacktrackingRateError, InvalidDecayRateError,
        InvalidIterationLimitError, InvalidMomentumCoefficientError, InvalidStepSizeError,
        InvalidStepSizeFloorError, InvalidSufficientDecreaseParameterError, InvalidToleranceError,
        IterationLimit, MomentumCoefficient, StepSize, StepSizeFloor, SufficientDecreaseParameter,
        Tolerance,
    },
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Error returned when a configuration cannot be validated.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum ConfigError {
    /// Momentum is only defined for the decay strategies.
    #[error("momentum cannot be combined with the line-search strategy")]
    MomentumWithLineSearch,
    /// Invalid initial step size.
    #[error("invalid initial step size: {0}")]
    StepSize(#[from] InvalidStepSizeError),
    /// Invalid decay rate.
    #[error("invalid decay rate: {0}")]
    DecayRate(#[from] InvalidDecayRateError),
    /// Invalid sufficient-decrease constant.
    #[error("invalid sufficient-decrease constant: {0}")]
    SufficientDecrease(#[from] InvalidSufficientDecreaseParameterError),
    /// Invalid backtracking rate.
    #[error("invalid backtracking rate: {0}")]
    BacktrackingRate(#[from] InvalidBacktrackingRateError),
    /// Invalid step-size floor.
    #[error("invalid step-size floor: {0}")]
    StepSizeFloor(#[from] InvalidStepSizeFloorError),
    /// Invalid momentum coefficient.
    #[error("invalid momentum coefficient: {0}")]
    Momentum(#[from] InvalidMomentumCoefficientError),
    /// Invalid tolerance.
    #[error("invalid tolerance: {0}")]
    Tolerance(#[from] InvalidToleranceError),
    /// Invalid iteration limit.
    #[error("invalid iteration limit: {0}")]
    IterationLimit(#[from] InvalidIterationLimitError),
    /// A required configuration field was not set.
    #[error("missing configuration field: {0}")]
    MissingField(&'static str),
}

impl From<derive_builder::UninitializedFieldError> for ConfigError {
    fn from(error: derive_builder::UninitializedFieldError) -> Self {
        Self::MissingField(error.field_name())
    }
}

/// Step-size adaptation strategies selectable from configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[non_exhaustive]
pub enum Strategy {
    /// Step size decays as `e^(−λk)`.
    #[default]
    ExponentialDecay,
    /// Step size decays as `1 / (1 + λk)`.
    InverseDecay,
    /// Backtracking line search under the Armijo rule.
    ArmijoLineSearch,
}

/// Flat option set for one optimizer,
/// as produced by an external configuration loader.
///
/// Defaults follow the reference configuration;
/// the constants the reference left inconsistent
/// are ordinary fields here.
///
/// # Examples
///
/// ```
/// use gradient_descent::{Config, Options, Strategy};
///
/// let config = Config::try_from(Options {
///     strategy: Strategy::InverseDecay,
///     use_momentum: true,
///     ..Options::default()
/// })
/// .unwrap();
/// assert!(config.momentum.is_some());
/// ```
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Initial step size `α₀`.
    pub alpha: f64,
    /// Iteration budget.
    pub max_it: usize,
    /// Tolerance on the squared step length.
    pub tol_x: f64,
    /// Tolerance on the objective change between iterates;
    /// `None` disables that criterion.
    pub tol_fun: Option<f64>,
    /// Step-size adaptation strategy.
    pub strategy: Strategy,
    /// Whether to use the momentum update rule.
    pub use_momentum: bool,
    /// Decay rate `λ` for the decay strategies.
    pub decay_rate: f64,
    /// Sufficient-decrease constant `c_1` for the line search.
    pub sufficient_decrease: f64,
    /// Multiplier applied to the step size between backtracking trials.
    pub backtracking_rate: f64,
    /// Floor under which the line search gives up.
    pub step_size_floor: f64,
    /// Momentum coefficient `β`.
    pub momentum: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            max_it: 100,
            tol_x: 1e-6,
            tol_fun: Some(1e-6),
            strategy: Strategy::default(),
            use_momentum: false,
            decay_rate: 0.2,
            sufficient_decrease: 0.2,
            backtracking_rate: 0.5,
            step_size_floor: 1e-6,
            momentum: 0.8,
        }
    }
}

impl TryFrom<Options> for Config {
    type Error = ConfigError;

    fn try_from(options: Options) -> Result<Self, Self::Error> {
        let schedule = match options.strategy {
            Strategy::ExponentialDecay => StepSchedule::ExponentialDecay {
                rate: DecayRate::new(options.decay_rate)?,
            },
            Strategy::InverseDecay => StepSchedule::InverseDecay {
                rate: DecayRate::new(options.decay_rate)?,
            },
            Strategy::ArmijoLineSearch => StepSchedule::BacktrackingLineSearch {
                c_1: SufficientDecreaseParameter::new(options.sufficient_decrease)?,
                rate: BacktrackingRate::new(options.backtracking_rate)?,
                floor: StepSizeFloor::new(options.step_size_floor)?,
            },
        };
        let momentum = options
            .use_momentum
            .then(|| MomentumCoefficient::new(options.momentum))
            .transpose()?;
        let stopping = StoppingCriteria {
            max_iterations: IterationLimit::new(options.max_it)?,
            step_tolerance: Tolerance::new(options.tol_x)?,
            value_tolerance: options.tol_fun.map(Tolerance::new).transpose()?,
        };
        Config::new(StepSize::new(options.alpha)?, schedule, momentum, stopping)
    }
}
