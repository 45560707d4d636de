/// Per-caller evaluation state
pub mod cache;
/// Fields with fixed values
pub mod constant;
/// Fields interpolated by Element Field Templates
pub mod finite_element;
/// The Region: a Mesh and the Fields defined over it
pub mod region;
/// Uniform sampling of Fields over every top-level Element
pub mod sampling;
/// The xi location as a Field
pub mod xi;

pub use cache::FieldCache;
pub use constant::ConstantField;
pub use finite_element::{FieldDefinitionError, FiniteElementField};
pub use region::{Region, RegionLoadError};
pub use sampling::{ElementSamples, UniformSampler};
pub use xi::XiField;

use crate::basis::BasisError;
use crate::integration::IntegrationField;
use crate::mesh::{ElementId, Mesh, MeshError};
use crate::nodes::{NodeId, NodeValueLabel};
use crate::Xi;

use nalgebra::DMatrix;
use std::fmt;

/// Fields are identified by their index in a Region
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub usize);

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Field({})", self.0)
    }
}

/// A location within an Element
#[derive(Clone, Debug, PartialEq)]
pub struct ElementXi {
    pub element: ElementId,
    pub xi: Xi,
}

impl ElementXi {
    pub fn new(element: ElementId, xi: &[f64]) -> Self {
        Self {
            element,
            xi: xi.iter().copied().collect(),
        }
    }
}

/// The result of evaluating a Field at an [ElementXi]
#[derive(Clone, Debug, PartialEq)]
pub struct FieldValues {
    pub values: Vec<f64>,
    /// `number of components` by `element dimension` table of derivatives with respect to xi
    pub derivatives: Option<DMatrix<f64>>,
}

/// The kinds of Field a Region can hold
#[derive(Clone, Debug)]
pub enum Field {
    Constant(ConstantField),
    FiniteElement(FiniteElementField),
    Integration(IntegrationField),
    Xi(XiField),
}

impl Field {
    pub fn name(&self) -> &str {
        match self {
            Self::Constant(field) => field.name(),
            Self::FiniteElement(field) => field.name(),
            Self::Integration(field) => field.name(),
            Self::Xi(field) => field.name(),
        }
    }

    pub fn number_of_components(&self) -> usize {
        match self {
            Self::Constant(field) => field.number_of_components(),
            Self::FiniteElement(field) => field.number_of_components(),
            Self::Integration(field) => field.number_of_components(),
            Self::Xi(field) => field.number_of_components(),
        }
    }

    pub fn is_defined_on_element(&self, mesh: &Mesh, element: ElementId) -> bool {
        match self {
            Self::Constant(_) | Self::Xi(_) => mesh.element(element).is_ok(),
            Self::FiniteElement(field) => field.is_defined_on_element(mesh, element),
            Self::Integration(field) => field.is_defined_on_element(mesh, element),
        }
    }

    /// Evaluate at `location`, without consulting any cache
    pub fn evaluate_in_element(
        &self,
        mesh: &Mesh,
        location: &ElementXi,
        derivatives: bool,
    ) -> Result<FieldValues, EvaluationError> {
        check_location(mesh, location)?;
        match self {
            Self::Constant(field) => field.evaluate(mesh, location, derivatives),
            Self::FiniteElement(field) => field.evaluate(mesh, location, derivatives),
            Self::Integration(field) => field.evaluate(mesh, location, derivatives),
            Self::Xi(field) => field.evaluate(mesh, location, derivatives),
        }
    }
}

fn check_location(mesh: &Mesh, location: &ElementXi) -> Result<(), EvaluationError> {
    let dimension = mesh.element(location.element)?.dimension();
    if location.xi.len() != dimension {
        return Err(EvaluationError::InvalidLocation {
            element: location.element,
            expected: dimension,
            found: location.xi.len(),
        });
    }
    Ok(())
}

/// The Error Type for failed Field evaluations
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationError {
    UnknownField(FieldId),
    NoLocation,
    InvalidLocation {
        element: ElementId,
        expected: usize,
        found: usize,
    },
    NotDefined {
        field: String,
        element: ElementId,
    },
    MissingNodeValue {
        node: NodeId,
        component: usize,
        label: NodeValueLabel,
        version: usize,
    },
    MissingScaleFactor {
        element: ElementId,
        index: usize,
    },
    MissingElementParameters {
        element: ElementId,
        component: usize,
    },
    MissingConstantParameter {
        component: usize,
    },
    NotComputed(String),
    ElementNotMapped(ElementId),
    Basis(BasisError),
    Mesh(MeshError),
}

impl std::error::Error for EvaluationError {}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnknownField(id) => write!(f, "{} does not exist; Cannot evaluate!", id),
            Self::NoLocation => write!(f, "Field Cache has no location; Cannot evaluate!"),
            Self::InvalidLocation {
                element,
                expected,
                found,
            } => write!(
                f,
                "Element {} needs {} xi coordinates, {} were given; Cannot evaluate!",
                element, expected, found
            ),
            Self::NotDefined { field, element } => write!(
                f,
                "Field '{}' is not defined on Element {}; Cannot evaluate!",
                field, element
            ),
            Self::MissingNodeValue {
                node,
                component,
                label,
                version,
            } => write!(
                f,
                "Node {} has no {} version {} for component {}; Cannot evaluate!",
                node,
                label,
                version + 1,
                component
            ),
            Self::MissingScaleFactor { element, index } => write!(
                f,
                "Element {} is missing scale factor {}; Cannot evaluate!",
                element,
                index + 1
            ),
            Self::MissingElementParameters { element, component } => write!(
                f,
                "Element {} has no parameters for component {}; Cannot evaluate!",
                element, component
            ),
            Self::MissingConstantParameter { component } => write!(
                f,
                "No constant parameter for component {}; Cannot evaluate!",
                component
            ),
            Self::NotComputed(field) => write!(
                f,
                "Field '{}' has not been computed; Cannot evaluate!",
                field
            ),
            Self::ElementNotMapped(element) => write!(
                f,
                "Element {} was not reached by the integration; Cannot evaluate!",
                element
            ),
            Self::Basis(err) => write!(f, "{}", err),
            Self::Mesh(err) => write!(f, "{}", err),
        }
    }
}

impl From<BasisError> for EvaluationError {
    fn from(err: BasisError) -> Self {
        Self::Basis(err)
    }
}

impl From<MeshError> for EvaluationError {
    fn from(err: MeshError) -> Self {
        Self::Mesh(err)
    }
}
