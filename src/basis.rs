/// One dimensional families of interpolation functions
mod shape_fns;
/// Tensor products of one dimensional families
mod tensor;

pub use shape_fns::BasisFunctionType;
pub use tensor::TensorBasis;

use crate::nodes::NodeValueLabel;
use nalgebra::DMatrix;
use std::fmt;

/// The family of interpolation functions associated with an Element shape.
///
/// A Basis is immutable and shared by reference between many Element Field Templates.
/// Alternate interpolation schemes can be used by implementing this trait.
pub trait Basis: fmt::Debug + Send + Sync {
    /// Parametric dimension of the Element this Basis is defined over
    fn dimension(&self) -> usize;

    fn number_of_functions(&self) -> usize;

    /// Number of nodes a standard node-based mapping refers to
    fn number_of_nodes(&self) -> usize;

    /// The local node and node value label weighted by `function` in the standard mapping
    fn function_node(&self, function: usize) -> Option<(usize, NodeValueLabel)>;

    /// Evaluate every function (and its first derivatives) at `xi`
    fn evaluate(&self, xi: &[f64]) -> Result<BasisValues, BasisError>;
}

/// Function weights and their derivatives at a single parametric location
#[derive(Clone, Debug, PartialEq)]
pub struct BasisValues {
    /// One weight per basis function
    pub weights: Vec<f64>,
    /// `number_of_functions` by `dimension` table of first derivatives
    pub derivatives: DMatrix<f64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BasisError {
    XiDimensionMismatch { expected: usize, found: usize },
    InvalidDimension(usize),
}

impl std::error::Error for BasisError {}

impl fmt::Display for BasisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::XiDimensionMismatch { expected, found } => write!(
                f,
                "Basis expects {} xi coordinates but {} were given; Cannot evaluate!",
                expected, found
            ),
            Self::InvalidDimension(dimension) => write!(
                f,
                "Basis dimension must be between 1 and {}, not {}; Cannot construct Basis!",
                crate::MAX_XI_DIMENSIONS,
                dimension
            ),
        }
    }
}
