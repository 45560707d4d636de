/// The Integration Field and its evaluation
pub mod field;
/// Element frames, the breadth first build and the upwind time step update
pub mod mapping;
/// Quadrature over the unit interval
pub mod quadrature;

pub use field::IntegrationField;
pub use mapping::{upwind_step, ElementMapping, IntegrationMapping};
pub use quadrature::QuadratureRule;

use crate::fields::{ElementXi, EvaluationError, Field, FieldCache, FieldId, Region};
use crate::mesh::{ElementId, MeshError};

use log::debug;
use std::fmt;

const XI_FIELD_NAME: &str = "xi";
const UNIT_FIELD_NAME: &str = "constant_1.0";

impl Region {
    /// Integrate `integrand` outward from `seed` with the default [QuadratureRule], and add
    /// the result to the Region as a new Field named `name`
    pub fn define_integration_field(
        &mut self,
        name: impl Into<String>,
        seed: ElementId,
        integrand: FieldId,
        coordinate: FieldId,
    ) -> Result<FieldId, IntegrationError> {
        self.define_integration_field_with_rule(name, seed, integrand, coordinate, QuadratureRule::default())
    }

    pub fn define_integration_field_with_rule(
        &mut self,
        name: impl Into<String>,
        seed: ElementId,
        integrand: FieldId,
        coordinate: FieldId,
        rule: QuadratureRule,
    ) -> Result<FieldId, IntegrationError> {
        let mapping = IntegrationMapping::build(self, seed, integrand, coordinate, rule)?;
        let dimension = self.mesh.element(seed)?.dimension();

        let field = IntegrationField::new(name, seed, integrand, coordinate, rule, mapping, dimension);
        let id = self.add_field(Field::Integration(field));
        debug!("Defined integration {} from seed Element {}", id, seed);
        Ok(id)
    }

    /// Integrate a unit integrand over the xi of each Element outward from `seed`.
    ///
    /// The resulting Field counts whole Elements from the seed, so its values can be passed
    /// straight back to [Region::find_integration_element_xi]. The `xi` and `constant_1.0`
    /// source Fields are reused if the Region already has them.
    pub fn define_xi_texture_coordinates(
        &mut self,
        name: impl Into<String>,
        seed: ElementId,
    ) -> Result<FieldId, IntegrationError> {
        let xi = match self.find_field_by_name(XI_FIELD_NAME) {
            Some(id) if matches!(self.field(id)?, Field::Xi(_)) => id,
            _ => self.add_xi_field(XI_FIELD_NAME),
        };
        let one = match self.find_field_by_name(UNIT_FIELD_NAME) {
            Some(id) if matches!(self.field(id)?, Field::Constant(c) if c.values() == [1.0]) => id,
            _ => self.add_constant_field(UNIT_FIELD_NAME, &[1.0]),
        };

        self.define_integration_field(name, seed, one, xi)
    }

    /// Rebuild an Integration Field from new sources.
    ///
    /// The Field keeps its previous definition and mapping if the rebuild fails.
    pub fn redefine_integration_field(
        &mut self,
        field: FieldId,
        seed: ElementId,
        integrand: FieldId,
        coordinate: FieldId,
    ) -> Result<(), IntegrationError> {
        let rule = self.integration_field(field)?.rule;
        if integrand == field || coordinate == field {
            return Err(IntegrationError::SelfReference(field));
        }

        let mapping = IntegrationMapping::build(self, seed, integrand, coordinate, rule)?;
        let dimension = self.mesh.element(seed)?.dimension();

        let integration = self.integration_field_mut(field)?;
        let name = integration.name().to_string();
        *integration = IntegrationField::new(name, seed, integrand, coordinate, rule, mapping, dimension);
        Ok(())
    }

    /// Advance a 1D Integration Field by one upwind time step of size `time_step`.
    ///
    /// The Field keeps its previous mapping if the update fails.
    pub fn update_integration_time_step(&mut self, field: FieldId, time_step: f64) -> Result<(), IntegrationError> {
        let integration = self.integration_field(field)?;
        let mapping = IntegrationMapping::update_time_step(
            self,
            integration.seed,
            &integration.mapping,
            integration.integrand,
            integration.coordinate,
            time_step,
            integration.rule,
        )?;

        self.integration_field_mut(field)?.mapping = mapping;
        Ok(())
    }

    /// Locate `values` of an Integration Field, trying the Element last found through
    /// `cache` first. On success the cache is moved to the returned location.
    pub fn find_integration_element_xi(
        &self,
        field: FieldId,
        values: &[f64],
        cache: &mut FieldCache,
    ) -> Result<ElementXi, IntegrationError> {
        let location = self
            .integration_field(field)?
            .find_element_xi(values, cache.last_found_element(field))?;

        cache.set_last_found_element(field, location.element);
        cache.set_element_xi(location.element, &location.xi);
        Ok(location)
    }

    pub fn integration_field(&self, field: FieldId) -> Result<&IntegrationField, IntegrationError> {
        match self.field(field)? {
            Field::Integration(integration) => Ok(integration),
            _ => Err(IntegrationError::NotIntegrationField(field)),
        }
    }

    fn integration_field_mut(&mut self, field: FieldId) -> Result<&mut IntegrationField, IntegrationError> {
        match self.field_mut(field)? {
            Field::Integration(integration) => Ok(integration),
            _ => Err(IntegrationError::NotIntegrationField(field)),
        }
    }
}

/// The Error Type for failed Integration Field definitions, updates and lookups
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationError {
    SeedNotFound(ElementId),
    SeedNotTopLevel(ElementId),
    IntegrandNotScalar(usize),
    InvalidCoordinateComponents(usize),
    NotOneDimensional(usize),
    MissingPreviousMapping(ElementId),
    NotIntegrationField(FieldId),
    SelfReference(FieldId),
    NoMappingForValues,
    WrongNumberOfValues { expected: usize, found: usize },
    Evaluation(EvaluationError),
    Mesh(MeshError),
}

impl fmt::Display for IntegrationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::SeedNotFound(element) => write!(f, "Seed Element {} does not exist; Cannot integrate!", element),
            Self::SeedNotTopLevel(element) => write!(f, "Seed Element {} is a face of another Element; Cannot integrate!", element),
            Self::IntegrandNotScalar(components) => {
                write!(f, "Integrand has {} components, expected 1; Cannot integrate!", components)
            }
            Self::InvalidCoordinateComponents(components) => write!(
                f,
                "Coordinate Field has {} components, expected 1 to {}; Cannot integrate!",
                components,
                crate::MAX_COORDINATE_COMPONENTS
            ),
            Self::NotOneDimensional(dimension) => write!(
                f,
                "Time step updates need a 1D mesh, the seed Element is {}D; Cannot update!",
                dimension
            ),
            Self::MissingPreviousMapping(element) => {
                write!(f, "Element {} has no previous mapping; Cannot update!", element)
            }
            Self::NotIntegrationField(field) => write!(f, "{} is not an Integration Field!", field),
            Self::SelfReference(field) => {
                write!(f, "{} cannot integrate over itself; Cannot redefine!", field)
            }
            Self::NoMappingForValues => write!(f, "No Element is mapped to the given values; Cannot find xi!"),
            Self::WrongNumberOfValues { expected, found } => {
                write!(f, "Expected {} values, found {}; Cannot find xi!", expected, found)
            }
            Self::Evaluation(err) => write!(f, "{}", err),
            Self::Mesh(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for IntegrationError {}

impl From<EvaluationError> for IntegrationError {
    fn from(err: EvaluationError) -> Self {
        Self::Evaluation(err)
    }
}

impl From<MeshError> for IntegrationError {
    fn from(err: MeshError) -> Self {
        Self::Mesh(err)
    }
}
