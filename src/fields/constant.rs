use super::{ElementXi, EvaluationError, FieldValues};
use crate::mesh::Mesh;

use nalgebra::DMatrix;

/// A Field with the same value everywhere
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantField {
    name: String,
    values: Vec<f64>,
}

impl ConstantField {
    pub fn new(name: impl Into<String>, values: &[f64]) -> Self {
        Self {
            name: name.into(),
            values: values.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_components(&self) -> usize {
        self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn set_values(&mut self, values: &[f64]) {
        self.values = values.to_vec();
    }

    pub fn evaluate(
        &self,
        mesh: &Mesh,
        location: &ElementXi,
        derivatives: bool,
    ) -> Result<FieldValues, EvaluationError> {
        let dimension = mesh.element(location.element)?.dimension();
        Ok(FieldValues {
            values: self.values.clone(),
            derivatives: if derivatives {
                Some(DMatrix::zeros(self.values.len(), dimension))
            } else {
                None
            },
        })
    }
}
