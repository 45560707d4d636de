use super::{Basis, BasisError, BasisFunctionType, BasisValues};
use crate::nodes::NodeValueLabel;
use crate::MAX_XI_DIMENSIONS;

use nalgebra::DMatrix;
use smallvec::SmallVec;

/// Tensor product of one dimensional function families, one per parametric direction.
///
/// Functions and nodes are numbered with xi1 varying fastest:
/// ```text
///   6 ------- 7
///   |\        |\         xi3
///   | 4 ------- 5         |  xi2
///   2 |------ 3 |         | /
///    \|        \|         |/
///     0 ------- 1         +------ xi1
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorBasis {
    axes: SmallVec<[BasisFunctionType; MAX_XI_DIMENSIONS]>,
}

impl TensorBasis {
    pub fn new(axes: &[BasisFunctionType]) -> Result<Self, BasisError> {
        if axes.is_empty() || axes.len() > MAX_XI_DIMENSIONS {
            Err(BasisError::InvalidDimension(axes.len()))
        } else {
            Ok(Self {
                axes: axes.iter().copied().collect(),
            })
        }
    }

    pub fn linear_lagrange(dimension: usize) -> Result<Self, BasisError> {
        Self::uniform(BasisFunctionType::LinearLagrange, dimension)
    }

    pub fn quadratic_lagrange(dimension: usize) -> Result<Self, BasisError> {
        Self::uniform(BasisFunctionType::QuadraticLagrange, dimension)
    }

    pub fn cubic_hermite(dimension: usize) -> Result<Self, BasisError> {
        Self::uniform(BasisFunctionType::CubicHermite, dimension)
    }

    fn uniform(family: BasisFunctionType, dimension: usize) -> Result<Self, BasisError> {
        Self::new(&vec![family; dimension])
    }

    pub fn axes(&self) -> &[BasisFunctionType] {
        &self.axes
    }

    // split a tensor index into one index per direction (xi1 fastest)
    fn split_index<F>(&self, mut index: usize, count: F) -> SmallVec<[usize; MAX_XI_DIMENSIONS]>
    where
        F: Fn(&BasisFunctionType) -> usize,
    {
        self.axes
            .iter()
            .map(|axis| {
                let n = count(axis);
                let local = index % n;
                index /= n;
                local
            })
            .collect()
    }
}

impl Basis for TensorBasis {
    fn dimension(&self) -> usize {
        self.axes.len()
    }

    fn number_of_functions(&self) -> usize {
        self.axes.iter().map(|a| a.number_of_functions()).product()
    }

    fn number_of_nodes(&self) -> usize {
        self.axes.iter().map(|a| a.number_of_nodes()).product()
    }

    fn function_node(&self, function: usize) -> Option<(usize, NodeValueLabel)> {
        if function >= self.number_of_functions() {
            return None;
        }

        let local_functions = self.split_index(function, |a| a.number_of_functions());

        let mut node = 0;
        let mut stride = 1;
        let mut derivative_mask = 0_u8;
        for (k, (axis, local_function)) in self.axes.iter().zip(local_functions).enumerate() {
            let (axis_node, is_derivative) = axis.function_node(local_function);
            node += axis_node * stride;
            stride *= axis.number_of_nodes();
            if is_derivative {
                derivative_mask |= 1 << k;
            }
        }

        NodeValueLabel::from_derivative_mask(derivative_mask).map(|label| (node, label))
    }

    fn evaluate(&self, xi: &[f64]) -> Result<BasisValues, BasisError> {
        let dimension = self.axes.len();
        if xi.len() != dimension {
            return Err(BasisError::XiDimensionMismatch {
                expected: dimension,
                found: xi.len(),
            });
        }

        let axis_values: SmallVec<[SmallVec<[(f64, f64); 4]>; MAX_XI_DIMENSIONS]> = self
            .axes
            .iter()
            .zip(xi.iter())
            .map(|(axis, x)| axis.evaluate(*x))
            .collect();

        let number_of_functions = self.number_of_functions();
        let mut weights = Vec::with_capacity(number_of_functions);
        let mut derivatives = DMatrix::zeros(number_of_functions, dimension);

        for function in 0..number_of_functions {
            let local_functions = self.split_index(function, |a| a.number_of_functions());

            weights.push(
                local_functions
                    .iter()
                    .enumerate()
                    .map(|(k, lf)| axis_values[k][*lf].0)
                    .product(),
            );

            for d in 0..dimension {
                derivatives[(function, d)] = local_functions
                    .iter()
                    .enumerate()
                    .map(|(k, lf)| {
                        let (value, derivative) = axis_values[k][*lf];
                        if k == d {
                            derivative
                        } else {
                            value
                        }
                    })
                    .product();
            }
        }

        Ok(BasisValues {
            weights,
            derivatives,
        })
    }
}
