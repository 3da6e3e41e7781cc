//! Bounded parameter types.
//!
//! Every numeric knob of the optimizer is a validated newtype:
//! construction checks bounds once,
//! so the core never re-validates parameters mid-run.

use derive_more::{Display, Into};
use num_traits::bounds::{LowerBounded, UpperBounded};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

macro_rules! derive_new_from_lower_bounded_f64 {
    ( $type:ident, $err:ident ) => {
        #[doc = concat!("Error returned when [`", stringify!($type), "`] is given an invalid value.")]
        #[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
        pub enum $err {
            /// Value is NaN.
            #[error("{0} is NaN")]
            IsNan(f64),
            /// Value is below lower bound.
            #[error("{0} is below lower bound ({})", $type::min_value())]
            TooLow(f64),
        }

        impl $type {
            #[doc = concat!("Return a new [`", stringify!($type), "`] if given a valid value.")]
            pub fn new(value: f64) -> Result<Self, $err> {
                if value.is_nan() {
                    Err($err::IsNan(value))
                } else if value < Self::min_value().0 {
                    Err($err::TooLow(value))
                } else {
                    Ok(Self(value))
                }
            }
        }
    };
}

macro_rules! derive_new_from_bounded_f64 {
    ( $type:ident, $err:ident ) => {
        #[doc = concat!("Error returned when [`", stringify!($type), "`] is given an invalid value.")]
        #[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
        pub enum $err {
            /// Value is NaN.
            #[error("{0} is NaN")]
            IsNan(f64),
            /// Value is below lower bound.
            #[error("{0} is below lower bound ({})", $type::min_value())]
            TooLow(f64),
            /// Value is above upper bound.
            #[error("{0} is above upper bound ({})", $type::max_value())]
            TooHigh(f64),
        }

        impl $type {
            #[doc = concat!("Return a new [`", stringify!($type), "`] if given a valid value.")]
            pub fn new(value: f64) -> Result<Self, $err> {
                if value.is_nan() {
                    Err($err::IsNan(value))
                } else if value < Self::min_value().0 {
                    Err($err::TooLow(value))
                } else if value > Self::max_value().0 {
                    Err($err::TooHigh(value))
                } else {
                    Ok(Self(value))
                }
            }
        }
    };
}

macro_rules! derive_bounded_f64_common {
    ( $type:ident, $err:ident ) => {
        impl $type {
            #[doc = concat!("Unwrap [`", stringify!($type), "`] into its inner value.")]
            pub fn into_inner(self) -> f64 {
                self.0
            }
        }

        impl TryFrom<f64> for $type {
            type Error = $err;

            fn try_from(value: f64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl Eq for $type {}

        #[allow(clippy::derive_ord_xor_partial_ord)]
        impl Ord for $type {
            fn cmp(&self, other: &Self) -> std::cmp::Ordering {
                // `f64` has total ordering for the range of values allowed by this type.
                unsafe { self.partial_cmp(other).unwrap_unchecked() }
            }
        }
    };
}

/// Initial step size,
/// `α₀`:
/// the multiplier applied to the negative gradient
/// before any schedule adjustment.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct StepSize(f64);

derive_new_from_lower_bounded_f64!(StepSize, InvalidStepSizeError);
derive_bounded_f64_common!(StepSize, InvalidStepSizeError);

impl Default for StepSize {
    fn default() -> Self {
        Self(0.2)
    }
}

impl LowerBounded for StepSize {
    fn min_value() -> Self {
        Self(f64::EPSILON)
    }
}

/// Decay rate,
/// `λ`,
/// for the exponential and inverse decay schedules.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct DecayRate(f64);

derive_new_from_lower_bounded_f64!(DecayRate, InvalidDecayRateError);
derive_bounded_f64_common!(DecayRate, InvalidDecayRateError);

impl Default for DecayRate {
    fn default() -> Self {
        Self(0.2)
    }
}

impl LowerBounded for DecayRate {
    fn min_value() -> Self {
        Self(f64::EPSILON)
    }
}

/// The sufficient decrease parameter,
/// `c_1`,
/// of the backtracking line search.
///
/// Reference values range from 0.2 to 0.4.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct SufficientDecreaseParameter(f64);

derive_new_from_bounded_f64!(
    SufficientDecreaseParameter,
    InvalidSufficientDecreaseParameterError
);
derive_bounded_f64_common!(
    SufficientDecreaseParameter,
    InvalidSufficientDecreaseParameterError
);

impl Default for SufficientDecreaseParameter {
    fn default() -> Self {
        Self(0.2)
    }
}

impl LowerBounded for SufficientDecreaseParameter {
    fn min_value() -> Self {
        Self(f64::EPSILON)
    }
}

impl UpperBounded for SufficientDecreaseParameter {
    fn max_value() -> Self {
        Self(1.0 - f64::EPSILON)
    }
}

/// Rate to decrease step size while line searching.
///
/// The default of 0.5 halves the step size on each rejected trial.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct BacktrackingRate(f64);

derive_new_from_bounded_f64!(BacktrackingRate, InvalidBacktrackingRateError);
derive_bounded_f64_common!(BacktrackingRate, InvalidBacktrackingRateError);

impl Default for BacktrackingRate {
    fn default() -> Self {
        Self(0.5)
    }
}

impl LowerBounded for BacktrackingRate {
    fn min_value() -> Self {
        Self(f64::EPSILON)
    }
}

impl UpperBounded for BacktrackingRate {
    fn max_value() -> Self {
        Self(1.0 - f64::EPSILON)
    }
}

/// Safeguard floor for the backtracking line search:
/// once the trial step size falls below this value
/// the search gives up.
///
/// This floor is the sole guard against an endless backtracking loop.
/// Reference values range from 1e-5 to 1e-6.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct StepSizeFloor(f64);

derive_new_from_lower_bounded_f64!(StepSizeFloor, InvalidStepSizeFloorError);
derive_bounded_f64_common!(StepSizeFloor, InvalidStepSizeFloorError);

impl Default for StepSizeFloor {
    fn default() -> Self {
        Self(1e-6)
    }
}

impl LowerBounded for StepSizeFloor {
    fn min_value() -> Self {
        Self(f64::MIN_POSITIVE)
    }
}

/// Momentum coefficient,
/// `β`:
/// the fraction of the previous step's scale
/// re-applied ahead of the current gradient step.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct MomentumCoefficient(f64);

derive_new_from_bounded_f64!(MomentumCoefficient, InvalidMomentumCoefficientError);
derive_bounded_f64_common!(MomentumCoefficient, InvalidMomentumCoefficientError);

impl Default for MomentumCoefficient {
    fn default() -> Self {
        Self(0.8)
    }
}

impl LowerBounded for MomentumCoefficient {
    fn min_value() -> Self {
        Self(f64::EPSILON)
    }
}

impl UpperBounded for MomentumCoefficient {
    fn max_value() -> Self {
        Self(1.0 - f64::EPSILON)
    }
}

/// Convergence tolerance,
/// used for both the squared step length
/// and the objective-change criterion.
#[derive(Clone, Copy, Debug, Display, PartialEq, PartialOrd, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "f64"))]
#[cfg_attr(feature = "serde", serde(try_from = "f64"))]
pub struct Tolerance(f64);

derive_new_from_lower_bounded_f64!(Tolerance, InvalidToleranceError);
derive_bounded_f64_common!(Tolerance, InvalidToleranceError);

impl Default for Tolerance {
    fn default() -> Self {
        Self(1e-6)
    }
}

impl LowerBounded for Tolerance {
    fn min_value() -> Self {
        Self(f64::MIN_POSITIVE)
    }
}

/// Iteration budget of one minimize run.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Into)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(into = "usize"))]
#[cfg_attr(feature = "serde", serde(try_from = "usize"))]
pub struct IterationLimit(usize);

/// Error returned when [`IterationLimit`] is given a value below lower bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{0} is below lower bound ({})", IterationLimit::min_value())]
pub struct InvalidIterationLimitError(usize);

impl IterationLimit {
    /// Return a new [`IterationLimit`] if given a valid value.
    pub fn new(value: usize) -> Result<Self, InvalidIterationLimitError> {
        if value < Self::min_value().0 {
            Err(InvalidIterationLimitError(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Unwrap [`IterationLimit`] into its inner value.
    pub fn into_inner(self) -> usize {
        self.0
    }
}

impl TryFrom<usize> for IterationLimit {
    type Error = InvalidIterationLimitError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Default for IterationLimit {
    fn default() -> Self {
        Self(100)
    }
}

impl LowerBounded for IterationLimit {
    fn min_value() -> Self {
        Self(1)
    }
}
