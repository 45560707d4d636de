use super::{IntegrationError, IntegrationMapping, QuadratureRule};
use crate::fields::{ElementXi, EvaluationError, FieldId, FieldValues};
use crate::mesh::{ElementId, Mesh};
use crate::Xi;

use nalgebra::{DMatrix, DVector};

/// A Field whose value in each mapped Element is `offset + differentials * xi`, obtained by
/// integrating a scalar `integrand` Field outward from a `seed` Element.
///
/// The Field has one component per xi direction of the seed Element. It is undefined on
/// Elements the integration did not reach.
#[derive(Clone, Debug)]
pub struct IntegrationField {
    name: String,
    pub(crate) seed: ElementId,
    pub(crate) integrand: FieldId,
    pub(crate) coordinate: FieldId,
    pub(crate) rule: QuadratureRule,
    pub(crate) mapping: IntegrationMapping,
    dimension: usize,
}

impl IntegrationField {
    pub(crate) fn new(
        name: impl Into<String>,
        seed: ElementId,
        integrand: FieldId,
        coordinate: FieldId,
        rule: QuadratureRule,
        mapping: IntegrationMapping,
        dimension: usize,
    ) -> Self {
        Self {
            name: name.into(),
            seed,
            integrand,
            coordinate,
            rule,
            mapping,
            dimension,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_components(&self) -> usize {
        self.dimension
    }

    pub fn seed(&self) -> ElementId {
        self.seed
    }

    pub fn integrand(&self) -> FieldId {
        self.integrand
    }

    pub fn coordinate(&self) -> FieldId {
        self.coordinate
    }

    pub fn rule(&self) -> QuadratureRule {
        self.rule
    }

    pub fn mapping(&self) -> &IntegrationMapping {
        &self.mapping
    }

    /// True if `element` (or the top-level Element it belongs to) was reached by the integration
    pub fn is_defined_on_element(&self, mesh: &Mesh, element: ElementId) -> bool {
        matches!(
            mesh.top_level_conversion_where(element, |top| self.mapping.contains(top)),
            Ok(Some(_))
        )
    }

    pub(crate) fn evaluate(
        &self,
        mesh: &Mesh,
        location: &ElementXi,
        derivatives: bool,
    ) -> Result<FieldValues, EvaluationError> {
        if self.mapping.is_empty() {
            return Err(EvaluationError::NotComputed(self.name.clone()));
        }

        let not_mapped = EvaluationError::ElementNotMapped(location.element);
        let (top, map) = mesh
            .top_level_conversion_where(location.element, |top| self.mapping.contains(top))?
            .ok_or_else(|| not_mapped.clone())?;
        let element_mapping = self.mapping.get(top).ok_or(not_mapped)?;
        let top_xi = map.apply(&location.xi)?;

        let values = element_mapping
            .offset
            .iter()
            .zip(element_mapping.differentials.iter())
            .zip(top_xi.iter())
            .map(|((offset, differential), xi)| offset + differential * xi)
            .collect();

        let derivatives = if derivatives {
            let scaling =
                DMatrix::from_diagonal(&DVector::from_column_slice(&element_mapping.differentials));
            Some(scaling * &map.jacobian)
        } else {
            None
        };

        Ok(FieldValues {
            values,
            derivatives,
        })
    }

    /// The Element and xi at which the Field takes `values`.
    ///
    /// The values are floored and matched exactly against the Element offsets, so this
    /// only succeeds on meshes whose mapped offsets are whole numbers. `hint` is tried first.
    pub fn find_element_xi(
        &self,
        values: &[f64],
        hint: Option<ElementId>,
    ) -> Result<ElementXi, IntegrationError> {
        if values.len() != self.dimension {
            return Err(IntegrationError::WrongNumberOfValues {
                expected: self.dimension,
                found: values.len(),
            });
        }

        let floors: Xi = values.iter().map(|v| v.floor()).collect();
        let element = self
            .mapping
            .find_by_offset(&floors, hint)
            .ok_or(IntegrationError::NoMappingForValues)?;

        let xi: Xi = values.iter().zip(floors.iter()).map(|(v, f)| v - f).collect();
        Ok(ElementXi { element, xi })
    }
}
