//! The objective-function capability consumed by the optimizer.

use blanket::blanket;

/// Error returned when an oracle cannot produce a value.
///
/// Expression-parsed evaluators surface their parse and domain errors
/// through [`OracleError::Evaluation`].
/// These errors are fatal to a run:
/// the optimizer propagates them immediately and does not retry.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// The objective or a derivative could not be evaluated.
    #[error("failed to evaluate objective: {0}")]
    Evaluation(String),
    /// A partial derivative was requested for a coordinate the oracle does not cover.
    #[error("no partial derivative for coordinate {coordinate} (dimension {dimension})")]
    CoordinateOutOfRange {
        /// Requested coordinate index.
        coordinate: usize,
        /// Number of coordinates the oracle covers.
        dimension: usize,
    },
}

/// An objective function together with its partial derivatives.
///
/// Implementations are expected to be pure:
/// the optimizer re-queries freely and never caches results.
/// Any concrete evaluator satisfies this trait,
/// whether hand-coded,
/// expression-parsed,
/// or numerically differentiated.
#[blanket(derive(Ref, Rc, Arc, Box))]
pub trait ObjectiveOracle {
    /// Return the objective value at `point`.
    fn evaluate(&self, point: &[f64]) -> Result<f64, OracleError>;

    /// Return the partial derivative of the objective
    /// with respect to `coordinate`
    /// at `point`.
    fn partial_derivative(&self, point: &[f64], coordinate: usize) -> Result<f64, OracleError>;
}

/// An oracle backed by plain functions:
/// one for the objective value
/// and one,
/// indexed by coordinate,
/// for its partial derivatives.
///
/// # Examples
///
/// ```
/// use gradient_descent::{FnOracle, ObjectiveOracle};
///
/// let sphere = FnOracle::new(
///     |point: &[f64]| point.iter().map(|x| x.powi(2)).sum(),
///     |point: &[f64], i| 2.0 * point[i],
///     2,
/// );
/// assert_eq!(sphere.evaluate(&[1.0, 2.0]), Ok(5.0));
/// assert_eq!(sphere.partial_derivative(&[1.0, 2.0], 1), Ok(4.0));
/// ```
#[derive(Clone, Debug)]
pub struct FnOracle<F, D> {
    value: F,
    partial: D,
    dimension: usize,
}

impl<F, D> FnOracle<F, D>
where
    F: Fn(&[f64]) -> f64,
    D: Fn(&[f64], usize) -> f64,
{
    /// Return a new oracle over `dimension` coordinates.
    pub fn new(value: F, partial: D, dimension: usize) -> Self {
        Self {
            value,
            partial,
            dimension,
        }
    }

    /// Return the number of coordinates this oracle covers.
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}

impl<F, D> ObjectiveOracle for FnOracle<F, D>
where
    F: Fn(&[f64]) -> f64,
    D: Fn(&[f64], usize) -> f64,
{
    fn evaluate(&self, point: &[f64]) -> Result<f64, OracleError> {
        Ok((self.value)(point))
    }

    fn partial_derivative(&self, point: &[f64], coordinate: usize) -> Result<f64, OracleError> {
        if coordinate >= self.dimension {
            return Err(OracleError::CoordinateOutOfRange {
                coordinate,
                dimension: self.dimension,
            });
        }
        Ok((self.partial)(point, coordinate))
    }
}
