#![warn(missing_debug_implementations)]
#![warn(missing_docs)]

//! Gradient descent with pluggable step-size schedules.
//!
//! The optimizer queries an [`ObjectiveOracle`] for partial derivatives,
//! adapts its step size each iteration
//! using a decay schedule or a backtracking line search,
//! optionally applies momentum,
//! and stops on step length,
//! objective change,
//! or an iteration budget.
//!
//! # Examples
//!
//! ```
//! use gradient_descent::{Config, FnOracle};
//!
//! let oracle = FnOracle::new(
//!     |point: &[f64]| point.iter().map(|x| x.powi(2)).sum(),
//!     |point: &[f64], i| 2.0 * point[i],
//!     2,
//! );
//!
//! let mut optimizer = Config::default().start(oracle);
//! let summary = optimizer.minimize(vec![1.0, 1.0]).unwrap();
//!
//! assert!(summary.converged());
//! println!(
//!     "minimum near {:?} after {} iterations",
//!     summary.point(),
//!     summary.iterations()
//! );
//! ```
//!
//! Configuration can also come from a flat,
//! loader-friendly option set:
//!
//! ```
//! use gradient_descent::{Config, Options, Strategy};
//!
//! let config = Config::try_from(Options {
//!     strategy: Strategy::ArmijoLineSearch,
//!     ..Options::default()
//! })
//! .unwrap();
//! ```

mod config;
mod descent;
mod oracle;
mod schedule;
mod types;

pub use self::{
    config::{ConfigError, Options, Strategy},
    descent::{
        Config, ConfigBuilder, GradientDescent, IterationState, StoppingCriteria, Summary,
        Termination,
    },
    oracle::{FnOracle, ObjectiveOracle, OracleError},
    schedule::{StepDecision, StepSchedule},
    types::*,
};
