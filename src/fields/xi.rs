use super::{ElementXi, EvaluationError, FieldValues};
use crate::mesh::Mesh;
use crate::MAX_XI_DIMENSIONS;

use nalgebra::DMatrix;

/// The xi location itself, as a Field defined on every Element.
///
/// It always has [MAX_XI_DIMENSIONS] components; those beyond the Element's dimension are 0.
#[derive(Clone, Debug, PartialEq)]
pub struct XiField {
    name: String,
}

impl XiField {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_components(&self) -> usize {
        MAX_XI_DIMENSIONS
    }

    pub fn evaluate(
        &self,
        mesh: &Mesh,
        location: &ElementXi,
        derivatives: bool,
    ) -> Result<FieldValues, EvaluationError> {
        let dimension = mesh.element(location.element)?.dimension();

        let values = (0..MAX_XI_DIMENSIONS)
            .map(|axis| location.xi.get(axis).copied().unwrap_or(0.0))
            .collect();

        Ok(FieldValues {
            values,
            derivatives: if derivatives {
                Some(DMatrix::identity(MAX_XI_DIMENSIONS, dimension))
            } else {
                None
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::ElementShape;

    #[test]
    fn padded_values_and_identity_derivatives() {
        let mut mesh = Mesh::blank();
        mesh.add_element(ElementShape::Square, &[0, 1, 2, 3]).unwrap();

        let result = XiField::new("xi")
            .evaluate(&mesh, &ElementXi::new(0, &[0.25, 0.75]), true)
            .unwrap();

        assert_eq!(result.values, vec![0.25, 0.75, 0.0]);
        let derivatives = result.derivatives.unwrap();
        assert_eq!(derivatives.shape(), (3, 2));
        assert_eq!(derivatives[(0, 0)], 1.0);
        assert_eq!(derivatives[(1, 1)], 1.0);
        assert_eq!(derivatives[(2, 1)], 0.0);
        assert_eq!(derivatives[(0, 1)], 0.0);
    }
}
