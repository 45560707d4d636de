use super::{ElementXi, EvaluationError, FieldValues};
use crate::mesh::{ElementId, Mesh, MeshError};
use crate::nodes::{NodeId, NodeParameters, NodeValueLabel};
use crate::template::{ElementFieldTemplate, MappingMode, RawFieldTemplate, TemplateError};

use log::debug;
use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// How a Field is interpolated over one top-level Element
#[derive(Clone, Debug)]
struct ElementFieldDefinition {
    /// One template shared by every component, or one per component
    templates: SmallVec<[Arc<RawFieldTemplate>; 3]>,
    local_nodes: Vec<NodeId>,
    scale_factors: Vec<f64>,
    /// Per component; only used by Element-mapped templates
    element_parameters: Vec<Option<Vec<f64>>>,
}

impl ElementFieldDefinition {
    fn template(&self, component: usize) -> Option<&Arc<RawFieldTemplate>> {
        match self.templates.len() {
            1 => self.templates.first(),
            _ => self.templates.get(component),
        }
    }
}

/// A Field interpolated over top-level Elements by [ElementFieldTemplate]s, with
/// parameters stored at Nodes, per Element, or once for the whole Field.
///
/// Evaluation on a face or line Element is performed on its top-level Element, with
/// derivatives converted back to the face's xi by the chain rule.
#[derive(Clone, Debug)]
pub struct FiniteElementField {
    name: String,
    number_of_components: usize,
    definitions: BTreeMap<ElementId, ElementFieldDefinition>,
    constant_parameters: Vec<Option<f64>>,
    node_parameters: NodeParameters,
}

impl FiniteElementField {
    pub fn new(name: impl Into<String>, number_of_components: usize) -> Self {
        Self {
            name: name.into(),
            number_of_components,
            definitions: BTreeMap::new(),
            constant_parameters: vec![None; number_of_components],
            node_parameters: NodeParameters::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn number_of_components(&self) -> usize {
        self.number_of_components
    }

    /// Define the Field over a top-level Element.
    ///
    /// `templates` holds either one template for every component or one per component.
    /// The templates are locked by this call (later edits fork a copy). `local_nodes` maps
    /// template local Node numbers to Nodes; `scale_factors` holds the values of the
    /// Element's local scale factors.
    pub fn define_on_element(
        &mut self,
        mesh: &Mesh,
        element: ElementId,
        templates: &mut [ElementFieldTemplate],
        local_nodes: &[NodeId],
        scale_factors: &[f64],
    ) -> Result<(), FieldDefinitionError> {
        let mesh_element = mesh.element(element)?;
        if !mesh_element.is_top_level() {
            return Err(FieldDefinitionError::NotTopLevel(element));
        }

        if templates.is_empty() || (templates.len() != 1 && templates.len() != self.number_of_components) {
            return Err(FieldDefinitionError::WrongNumberOfTemplates {
                expected: self.number_of_components,
                found: templates.len(),
            });
        }

        for template in templates.iter() {
            let basis_dimension = template.basis().dimension();
            if basis_dimension != mesh_element.dimension() {
                return Err(FieldDefinitionError::BasisDimensionMismatch {
                    element,
                    expected: mesh_element.dimension(),
                    found: basis_dimension,
                });
            }
            if template.number_of_local_nodes() > local_nodes.len() {
                return Err(FieldDefinitionError::TooFewLocalNodes {
                    expected: template.number_of_local_nodes(),
                    found: local_nodes.len(),
                });
            }
            template.validate()?;
        }

        let locked = templates
            .iter_mut()
            .map(|template| template.lock_for_use())
            .collect::<Result<SmallVec<[Arc<RawFieldTemplate>; 3]>, TemplateError>>()?;

        let replaced = self
            .definitions
            .insert(
                element,
                ElementFieldDefinition {
                    templates: locked,
                    local_nodes: local_nodes.to_vec(),
                    scale_factors: scale_factors.to_vec(),
                    element_parameters: vec![None; self.number_of_components],
                },
            )
            .is_some();

        if replaced {
            debug!("Field '{}' redefined on Element {}", self.name, element);
        }
        Ok(())
    }

    pub fn is_defined_on_element(&self, mesh: &Mesh, element: ElementId) -> bool {
        matches!(
            mesh.top_level_conversion_where(element, |top| self.definitions.contains_key(&top)),
            Ok(Some(_))
        )
    }

    pub fn defined_elements(&self) -> impl Iterator<Item = ElementId> + '_ {
        self.definitions.keys().copied()
    }

    /// The template used for `component` on `element`, if the Field is defined there
    pub fn element_template(&self, element: ElementId, component: usize) -> Option<&RawFieldTemplate> {
        self.definitions
            .get(&element)
            .and_then(|definition| definition.template(component))
            .map(|template| template.as_ref())
    }

    /// Set the parameter of every function for one component of an Element-mapped definition
    pub fn set_element_parameters(
        &mut self,
        element: ElementId,
        component: usize,
        parameters: &[f64],
    ) -> Result<(), FieldDefinitionError> {
        if component >= self.number_of_components {
            return Err(FieldDefinitionError::InvalidComponent(component));
        }

        let definition = self
            .definitions
            .get_mut(&element)
            .ok_or(FieldDefinitionError::NotDefinedOnElement(element))?;

        let template = definition
            .template(component)
            .ok_or(FieldDefinitionError::InvalidComponent(component))?;
        if template.mapping_mode() != MappingMode::Element {
            return Err(FieldDefinitionError::Template(TemplateError::ModeMismatch(
                template.mapping_mode(),
            )));
        }
        if parameters.len() != template.number_of_functions() {
            return Err(FieldDefinitionError::WrongNumberOfParameters {
                expected: template.number_of_functions(),
                found: parameters.len(),
            });
        }

        definition.element_parameters[component] = Some(parameters.to_vec());
        Ok(())
    }

    pub fn set_scale_factors(&mut self, element: ElementId, scale_factors: &[f64]) -> Result<(), FieldDefinitionError> {
        self.definitions
            .get_mut(&element)
            .ok_or(FieldDefinitionError::NotDefinedOnElement(element))?
            .scale_factors = scale_factors.to_vec();
        Ok(())
    }

    /// Set the single parameter of a component for Constant-mapped definitions
    pub fn set_constant_parameter(&mut self, component: usize, value: f64) -> Result<(), FieldDefinitionError> {
        let parameter = self
            .constant_parameters
            .get_mut(component)
            .ok_or(FieldDefinitionError::InvalidComponent(component))?;
        *parameter = Some(value);
        Ok(())
    }

    pub fn set_node_value(
        &mut self,
        node: NodeId,
        component: usize,
        label: NodeValueLabel,
        version: usize,
        value: f64,
    ) -> Result<(), FieldDefinitionError> {
        if component >= self.number_of_components {
            return Err(FieldDefinitionError::InvalidComponent(component));
        }
        self.node_parameters
            .set_value(node, component, label, version, value);
        Ok(())
    }

    pub fn node_parameters(&self) -> &NodeParameters {
        &self.node_parameters
    }

    pub fn node_parameters_mut(&mut self) -> &mut NodeParameters {
        &mut self.node_parameters
    }

    pub fn evaluate(
        &self,
        mesh: &Mesh,
        location: &ElementXi,
        derivatives: bool,
    ) -> Result<FieldValues, EvaluationError> {
        self.evaluate_with(mesh, location, derivatives, true)
    }

    fn evaluate_with(
        &self,
        mesh: &Mesh,
        location: &ElementXi,
        derivatives: bool,
        allow_fast_path: bool,
    ) -> Result<FieldValues, EvaluationError> {
        let not_defined = || EvaluationError::NotDefined {
            field: self.name.clone(),
            element: location.element,
        };
        let (top, map) = mesh
            .top_level_conversion_where(location.element, |top| self.definitions.contains_key(&top))?
            .ok_or_else(not_defined)?;
        let definition = self.definitions.get(&top).ok_or_else(not_defined)?;

        let top_xi = map.apply(&location.xi)?;

        let mut values = Vec::with_capacity(self.number_of_components);
        let mut top_derivatives = DMatrix::zeros(self.number_of_components, top_xi.len());

        for component in 0..self.number_of_components {
            let template = definition.template(component).ok_or_else(not_defined)?;
            let basis_values = template.basis().evaluate(&top_xi)?;
            let parameters =
                self.function_parameters(definition, template, top, component, allow_fast_path)?;

            values.push(DVector::from_column_slice(&basis_values.weights).dot(&parameters));
            if derivatives {
                let component_derivatives = basis_values.derivatives.tr_mul(&parameters);
                top_derivatives
                    .row_mut(component)
                    .copy_from(&component_derivatives.transpose());
            }
        }

        Ok(FieldValues {
            values,
            derivatives: if derivatives {
                Some(top_derivatives * &map.jacobian)
            } else {
                None
            },
        })
    }

    /// The parameter weighting each basis function for one component
    fn function_parameters(
        &self,
        definition: &ElementFieldDefinition,
        template: &RawFieldTemplate,
        element: ElementId,
        component: usize,
        allow_fast_path: bool,
    ) -> Result<DVector<f64>, EvaluationError> {
        let number_of_functions = template.number_of_functions();

        match template.mapping_mode() {
            MappingMode::Constant => self
                .constant_parameters
                .get(component)
                .copied()
                .flatten()
                .map(|value| DVector::from_element(number_of_functions, value))
                .ok_or(EvaluationError::MissingConstantParameter { component }),
            MappingMode::Element => definition
                .element_parameters
                .get(component)
                .and_then(|parameters| parameters.as_deref())
                .map(DVector::from_column_slice)
                .ok_or(EvaluationError::MissingElementParameters { element, component }),
            MappingMode::Node if allow_fast_path && template.simple_unscaled_node_optimisation() => {
                (0..number_of_functions)
                    .map(|f| {
                        let node = self.local_node(definition, element, f)?;
                        self.node_value(node, component, NodeValueLabel::Value, 0)
                    })
                    .collect::<Result<Vec<f64>, EvaluationError>>()
                    .map(DVector::from_vec)
            }
            MappingMode::Node => (0..number_of_functions)
                .map(|f| {
                    template
                        .function_terms(f)
                        .iter()
                        .try_fold(0.0, |sum, term| {
                            let node = self.local_node(definition, element, term.local_node)?;
                            let value = self.node_value(node, component, term.value_label, term.version)?;
                            let scaling = term.scale_factors.iter().try_fold(1.0, |product, index| {
                                definition
                                    .scale_factors
                                    .get(*index)
                                    .map(|scale_factor| product * scale_factor)
                                    .ok_or(EvaluationError::MissingScaleFactor {
                                        element,
                                        index: *index,
                                    })
                            })?;
                            Ok(sum + value * scaling)
                        })
                })
                .collect::<Result<Vec<f64>, EvaluationError>>()
                .map(DVector::from_vec),
        }
    }

    fn local_node(
        &self,
        definition: &ElementFieldDefinition,
        element: ElementId,
        local_node: usize,
    ) -> Result<NodeId, EvaluationError> {
        definition
            .local_nodes
            .get(local_node)
            .copied()
            .ok_or_else(|| EvaluationError::NotDefined {
                field: self.name.clone(),
                element,
            })
    }

    fn node_value(
        &self,
        node: NodeId,
        component: usize,
        label: NodeValueLabel,
        version: usize,
    ) -> Result<f64, EvaluationError> {
        self.node_parameters
            .value(node, component, label, version)
            .ok_or(EvaluationError::MissingNodeValue {
                node,
                component,
                label,
                version,
            })
    }
}

/// The Error Type for invalid Finite Element Field definitions
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefinitionError {
    Mesh(MeshError),
    NotTopLevel(ElementId),
    WrongNumberOfTemplates { expected: usize, found: usize },
    BasisDimensionMismatch { element: ElementId, expected: usize, found: usize },
    TooFewLocalNodes { expected: usize, found: usize },
    Template(TemplateError),
    NotDefinedOnElement(ElementId),
    InvalidComponent(usize),
    WrongNumberOfParameters { expected: usize, found: usize },
}

impl std::error::Error for FieldDefinitionError {}

impl fmt::Display for FieldDefinitionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Mesh(err) => write!(f, "{}", err),
            Self::NotTopLevel(element) => write!(
                f,
                "Element {} is a face of another Element; Cannot define Field!",
                element
            ),
            Self::WrongNumberOfTemplates { expected, found } => write!(
                f,
                "Expected 1 or {} templates, found {}; Cannot define Field!",
                expected, found
            ),
            Self::BasisDimensionMismatch {
                element,
                expected,
                found,
            } => write!(
                f,
                "Element {} has dimension {} but the template Basis has dimension {}; Cannot define Field!",
                element, expected, found
            ),
            Self::TooFewLocalNodes { expected, found } => write!(
                f,
                "Template uses {} local Nodes, {} were given; Cannot define Field!",
                expected, found
            ),
            Self::Template(err) => write!(f, "{}", err),
            Self::NotDefinedOnElement(element) => write!(
                f,
                "Field is not defined on Element {}; Cannot set parameters!",
                element
            ),
            Self::InvalidComponent(component) => write!(
                f,
                "Field has no component {}; Cannot set parameters!",
                component
            ),
            Self::WrongNumberOfParameters { expected, found } => write!(
                f,
                "Expected {} parameters, found {}; Cannot set parameters!",
                expected, found
            ),
        }
    }
}

impl From<MeshError> for FieldDefinitionError {
    fn from(err: MeshError) -> Self {
        Self::Mesh(err)
    }
}

impl From<TemplateError> for FieldDefinitionError {
    fn from(err: TemplateError) -> Self {
        Self::Template(err)
    }
}
