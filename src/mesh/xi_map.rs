use super::MeshError;
use crate::Xi;

use nalgebra::{DMatrix, DVector};

/// An affine map between parametric spaces: `xi_parent = offset + jacobian * xi_child`
#[derive(Clone, Debug, PartialEq)]
pub struct XiMap {
    pub offset: DVector<f64>,
    /// `parent dimension` by `child dimension`
    pub jacobian: DMatrix<f64>,
}

impl XiMap {
    pub fn identity(dimension: usize) -> Self {
        Self {
            offset: DVector::zeros(dimension),
            jacobian: DMatrix::identity(dimension, dimension),
        }
    }

    pub fn source_dimension(&self) -> usize {
        self.jacobian.ncols()
    }

    pub fn target_dimension(&self) -> usize {
        self.jacobian.nrows()
    }

    pub fn apply(&self, xi: &[f64]) -> Result<Xi, MeshError> {
        if xi.len() != self.source_dimension() {
            return Err(MeshError::XiDimensionMismatch {
                expected: self.source_dimension(),
                found: xi.len(),
            });
        }

        let mapped = &self.offset + &self.jacobian * DVector::from_column_slice(xi);
        Ok(mapped.iter().copied().collect())
    }

    /// The map equivalent to applying `inner` first, then `self`
    pub fn compose(&self, inner: &Self) -> Self {
        Self {
            offset: &self.offset + &self.jacobian * &inner.offset,
            jacobian: &self.jacobian * &inner.jacobian,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.offset.iter().all(|o| *o == 0.0)
            && self.jacobian.is_square()
            && self.jacobian == DMatrix::identity(self.target_dimension(), self.source_dimension())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compose_face_maps() {
        // square face 1 (xi1 = 1) of a cube
        let face = XiMap {
            offset: DVector::from_column_slice(&[1.0, 0.0, 0.0]),
            jacobian: DMatrix::from_row_slice(3, 2, &[0.0, 0.0, 1.0, 0.0, 0.0, 1.0]),
        };
        // line face 2 (xi2 = 0) of that square
        let line = XiMap {
            offset: DVector::from_column_slice(&[0.0, 0.0]),
            jacobian: DMatrix::from_row_slice(2, 1, &[1.0, 0.0]),
        };

        let composed = face.compose(&line);
        assert_eq!(composed.source_dimension(), 1);
        assert_eq!(composed.target_dimension(), 3);

        let xi = composed.apply(&[0.25]).unwrap();
        assert_eq!(xi.as_slice(), &[1.0, 0.25, 0.0]);
    }

    #[test]
    fn identity() {
        let map = XiMap::identity(2);
        assert!(map.is_identity());
        assert_eq!(map.apply(&[0.3, 0.6]).unwrap().as_slice(), &[0.3, 0.6]);
        assert!(map.apply(&[0.3]).is_err());
    }
}
