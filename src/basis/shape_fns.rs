use smallvec::{smallvec, SmallVec};

/// Interpolation along a single parametric direction (defined over [0.0, 1.0]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BasisFunctionType {
    /// Two functions with nodes at 0 and 1
    LinearLagrange,
    /// Three functions with nodes at 0, 0.5 and 1
    QuadraticLagrange,
    /// Four functions: value and first derivative at nodes 0 and 1
    CubicHermite,
}

impl BasisFunctionType {
    pub fn number_of_functions(&self) -> usize {
        match self {
            Self::LinearLagrange => 2,
            Self::QuadraticLagrange => 3,
            Self::CubicHermite => 4,
        }
    }

    pub fn number_of_nodes(&self) -> usize {
        match self {
            Self::LinearLagrange => 2,
            Self::QuadraticLagrange => 3,
            Self::CubicHermite => 2,
        }
    }

    /// The node (along this direction) weighted by `function`, and whether it weights the node's derivative
    pub fn function_node(&self, function: usize) -> (usize, bool) {
        match self {
            Self::LinearLagrange | Self::QuadraticLagrange => (function, false),
            Self::CubicHermite => (function / 2, function % 2 == 1),
        }
    }

    /// `(value, derivative)` of each function at `x`
    pub fn evaluate(&self, x: f64) -> SmallVec<[(f64, f64); 4]> {
        match self {
            Self::LinearLagrange => smallvec![(1.0 - x, -1.0), (x, 1.0)],
            Self::QuadraticLagrange => smallvec![
                (2.0 * x * x - 3.0 * x + 1.0, 4.0 * x - 3.0),
                (4.0 * x * (1.0 - x), 4.0 - 8.0 * x),
                (2.0 * x * x - x, 4.0 * x - 1.0),
            ],
            Self::CubicHermite => {
                let x2 = x * x;
                let x3 = x2 * x;
                smallvec![
                    (1.0 - 3.0 * x2 + 2.0 * x3, 6.0 * x2 - 6.0 * x),
                    (x - 2.0 * x2 + x3, 1.0 - 4.0 * x + 3.0 * x2),
                    (3.0 * x2 - 2.0 * x3, 6.0 * x - 6.0 * x2),
                    (x3 - x2, 3.0 * x2 - 2.0 * x),
                ]
            }
        }
    }
}
