use super::{
    ConstantField, ElementXi, EvaluationError, Field, FieldCache, FieldDefinitionError, FieldId,
    FieldValues, FiniteElementField, XiField,
};
use crate::basis::TensorBasis;
use crate::mesh::{ElementId, ElementShape, Mesh, MeshError};
use crate::nodes::NodeValueLabel;
use crate::template::{ElementFieldTemplate, MappingMode};
use crate::{MAX_COORDINATE_COMPONENTS, MAX_XI_DIMENSIONS};

use json::JsonValue;
use log::{debug, trace};
use std::fmt;
use std::fs::read_to_string;
use std::path::Path;
use std::sync::Arc;

/// A Mesh and the Fields defined over it
#[derive(Clone, Debug, Default)]
pub struct Region {
    pub mesh: Mesh,
    fields: Vec<Field>,
}

impl Region {
    pub fn new(mesh: Mesh) -> Self {
        Self {
            mesh,
            fields: Vec::new(),
        }
    }

    /// Construct a Region from a JSON file with the following format
    ///
    /// ```text
    ///  2 ------- 3 ------- 5
    ///  |         |         |
    ///  |    0    |    1    |
    ///  |         |         |
    ///  0 ------- 1 ------- 4
    /// ```
    ///
    /// region.json
    /// ```JSON
    /// {
    ///     "Nodes": [
    ///         [0.0, 0.0],
    ///         [1.0, 0.0],
    ///         [0.0, 1.0],
    ///         [1.0, 1.0],
    ///         [2.0, 0.0],
    ///         [2.0, 1.0]
    ///     ],
    ///     "Elements": [
    ///         { "shape": "square", "node_ids": [0, 1, 2, 3] },
    ///         { "shape": "square", "node_ids": [1, 4, 3, 5] }
    ///     ]
    /// }
    /// ```
    ///
    /// Each Node lists 1 to 3 coordinates (the same number for every Node). Element shapes are
    /// "line", "square" or "cube", with corner Nodes listed xi1 fastest. Faces are defined, and a
    /// linear Lagrange "coordinates" Field is defined over every Element.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RegionLoadError> {
        let contents = read_to_string(path.as_ref())?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, RegionLoadError> {
        let region_json = json::parse(contents)?;

        let points = parse_node_information(&region_json)?;
        let elements = parse_element_information(&region_json, points.len())?;

        let mut mesh = Mesh::blank();
        for (shape, node_ids) in elements.iter() {
            mesh.add_element(*shape, node_ids)?;
        }
        mesh.define_faces()?;

        let number_of_components = points.first().map_or(0, |p| p.len());
        let mut coordinates = FiniteElementField::new("coordinates", number_of_components);

        // one shared template per Element dimension
        let mut templates: Vec<Option<ElementFieldTemplate>> = vec![None; MAX_XI_DIMENSIONS];
        for (element_id, (shape, node_ids)) in elements.iter().enumerate() {
            let dimension = shape.dimension();
            let template = match &mut templates[dimension - 1] {
                Some(template) => template,
                empty => empty.insert(linear_node_template(dimension)?),
            };

            coordinates.define_on_element(
                &mesh,
                element_id,
                std::slice::from_mut(template),
                node_ids,
                &[],
            )?;
        }

        for (node, point) in points.iter().enumerate() {
            for (component, value) in point.iter().enumerate() {
                coordinates.set_node_value(node, component, NodeValueLabel::Value, 0, *value)?;
            }
        }

        debug!(
            "Loaded Region with {} Nodes and {} Elements",
            points.len(),
            elements.len()
        );

        let mut region = Self::new(mesh);
        region.add_finite_element_field(coordinates);
        Ok(region)
    }

    pub(crate) fn add_field(&mut self, field: Field) -> FieldId {
        let id = FieldId(self.fields.len());
        trace!("Adding {} '{}'", id, field.name());
        self.fields.push(field);
        id
    }

    pub fn add_constant_field(&mut self, name: impl Into<String>, values: &[f64]) -> FieldId {
        self.add_field(Field::Constant(ConstantField::new(name, values)))
    }

    pub fn add_finite_element_field(&mut self, field: FiniteElementField) -> FieldId {
        self.add_field(Field::FiniteElement(field))
    }

    pub fn add_xi_field(&mut self, name: impl Into<String>) -> FieldId {
        self.add_field(Field::Xi(XiField::new(name)))
    }

    pub fn field(&self, id: FieldId) -> Result<&Field, EvaluationError> {
        self.fields
            .get(id.0)
            .ok_or(EvaluationError::UnknownField(id))
    }

    pub(crate) fn field_mut(&mut self, id: FieldId) -> Result<&mut Field, EvaluationError> {
        self.fields
            .get_mut(id.0)
            .ok_or(EvaluationError::UnknownField(id))
    }

    pub fn finite_element_field_mut(&mut self, id: FieldId) -> Option<&mut FiniteElementField> {
        match self.fields.get_mut(id.0) {
            Some(Field::FiniteElement(field)) => Some(field),
            _ => None,
        }
    }

    pub fn find_field_by_name(&self, name: &str) -> Option<FieldId> {
        self.fields
            .iter()
            .position(|field| field.name() == name)
            .map(FieldId)
    }

    pub fn number_of_fields(&self) -> usize {
        self.fields.len()
    }

    /// Evaluate a Field at the cache's current location.
    ///
    /// Values already stored in the cache for this location are returned without
    /// re-evaluating. A failed evaluation leaves the cache untouched.
    pub fn evaluate<'c>(
        &self,
        field: FieldId,
        cache: &'c mut FieldCache,
        derivatives: bool,
    ) -> Result<&'c FieldValues, EvaluationError> {
        let location = cache.location().cloned().ok_or(EvaluationError::NoLocation)?;
        let field_ref = self.field(field)?;

        if cache.has_values(field, derivatives) {
            return cache
                .values(field)
                .ok_or(EvaluationError::NotComputed(field_ref.name().to_string()));
        }

        let values = field_ref.evaluate_in_element(&self.mesh, &location, derivatives)?;
        Ok(cache.store(field, values))
    }

    /// Evaluate a Field at a single location, using a temporary cache
    pub fn evaluate_at(
        &self,
        field: FieldId,
        element: ElementId,
        xi: &[f64],
        derivatives: bool,
    ) -> Result<FieldValues, EvaluationError> {
        self.field(field)?
            .evaluate_in_element(&self.mesh, &ElementXi::new(element, xi), derivatives)
    }
}

fn linear_node_template(dimension: usize) -> Result<ElementFieldTemplate, RegionLoadError> {
    let basis = TensorBasis::linear_lagrange(dimension)
        .map_err(|err| RegionLoadError::Format(err.to_string()))?;
    let mut template = ElementFieldTemplate::new(Arc::new(basis));
    template
        .set_mapping_mode(MappingMode::Node)
        .map_err(FieldDefinitionError::from)?;
    Ok(template)
}

fn parse_node_information(region_json: &JsonValue) -> Result<Vec<Vec<f64>>, RegionLoadError> {
    if !region_json["Nodes"].is_array() {
        return Err(RegionLoadError::Format("Nodes must be an Array!".to_string()));
    }

    let points = region_json["Nodes"]
        .members()
        .map(|json_node_point| {
            if !json_node_point.is_array() {
                return Err(RegionLoadError::Format("Nodes must be Arrays!".to_string()));
            }
            json_node_point
                .members()
                .map(|coordinate| {
                    coordinate.as_f64().ok_or_else(|| {
                        RegionLoadError::Format("Nodes must be composed of numerical values!".to_string())
                    })
                })
                .collect::<Result<Vec<f64>, RegionLoadError>>()
        })
        .collect::<Result<Vec<Vec<f64>>, RegionLoadError>>()?;

    let number_of_components = points.first().map_or(0, |p| p.len());
    if number_of_components == 0 || number_of_components > MAX_COORDINATE_COMPONENTS {
        return Err(RegionLoadError::Format(format!(
            "Nodes must have between 1 and {} coordinates!",
            MAX_COORDINATE_COMPONENTS
        )));
    }
    if points.iter().any(|p| p.len() != number_of_components) {
        return Err(RegionLoadError::Format(
            "All Nodes must have the same number of coordinates!".to_string(),
        ));
    }

    Ok(points)
}

fn parse_element_information(
    region_json: &JsonValue,
    num_nodes: usize,
) -> Result<Vec<(ElementShape, Vec<usize>)>, RegionLoadError> {
    if !region_json["Elements"].is_array() {
        return Err(RegionLoadError::Format("Elements must be an Array!".to_string()));
    }

    region_json["Elements"]
        .members()
        .map(|json_element| {
            let shape = json_element["shape"]
                .as_str()
                .and_then(ElementShape::from_name)
                .ok_or_else(|| {
                    RegionLoadError::Format(
                        "Elements must have a shape of \"line\", \"square\" or \"cube\"!".to_string(),
                    )
                })?;

            if !json_element["node_ids"].is_array() {
                return Err(RegionLoadError::Format(
                    "Elements must have an Array of node_ids!".to_string(),
                ));
            }

            let node_ids = json_element["node_ids"]
                .members()
                .map(|node_id_json| match node_id_json.as_usize() {
                    Some(node_id) if node_id < num_nodes => Ok(node_id),
                    _ => Err(RegionLoadError::Format(
                        "node_ids must be integers smaller than the total number of Nodes!".to_string(),
                    )),
                })
                .collect::<Result<Vec<usize>, RegionLoadError>>()?;

            Ok((shape, node_ids))
        })
        .collect()
}

/// The Error Type for Region description files that cannot be loaded
#[derive(Debug)]
pub enum RegionLoadError {
    Io(std::io::Error),
    Json(json::Error),
    Format(String),
    Mesh(MeshError),
    Definition(FieldDefinitionError),
}

impl std::error::Error for RegionLoadError {}

impl fmt::Display for RegionLoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Unable to read Region file: {}", err),
            Self::Json(err) => write!(f, "Unable to parse Region file as JSON: {}", err),
            Self::Format(msg) => write!(f, "{} Cannot construct Region from file!", msg),
            Self::Mesh(err) => write!(f, "{}", err),
            Self::Definition(err) => write!(f, "{}", err),
        }
    }
}

impl From<std::io::Error> for RegionLoadError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<json::Error> for RegionLoadError {
    fn from(err: json::Error) -> Self {
        Self::Json(err)
    }
}

impl From<MeshError> for RegionLoadError {
    fn from(err: MeshError) -> Self {
        Self::Mesh(err)
    }
}

impl From<FieldDefinitionError> for RegionLoadError {
    fn from(err: FieldDefinitionError) -> Self {
        Self::Definition(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TWO_SQUARES: &str = r#"{
        "Nodes": [[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [3.0, 0.0], [3.0, 1.0]],
        "Elements": [
            { "shape": "square", "node_ids": [0, 1, 2, 3] },
            { "shape": "square", "node_ids": [1, 4, 3, 5] }
        ]
    }"#;

    #[test]
    fn load_region() {
        let region = Region::from_json_str(TWO_SQUARES).unwrap();
        assert_eq!(region.mesh.top_level_elements().count(), 2);
        assert_eq!(region.mesh.adjacent_elements(0, 1).unwrap(), vec![1]);

        let coordinates = region.find_field_by_name("coordinates").unwrap();
        let values = region.evaluate_at(coordinates, 1, &[0.5, 0.25], true).unwrap();
        assert_relative_eq!(values.values[0], 2.0, epsilon = 1e-14);
        assert_relative_eq!(values.values[1], 0.25, epsilon = 1e-14);
        assert_relative_eq!(values.derivatives.unwrap()[(0, 0)], 2.0, epsilon = 1e-14);

        match region.field(coordinates).unwrap() {
            Field::FiniteElement(field) => assert!(std::ptr::eq(
                field.element_template(0, 0).unwrap(),
                field.element_template(1, 0).unwrap()
            )),
            _ => panic!("coordinates should be a finite element field"),
        }
    }

    #[test]
    fn malformed_regions() {
        assert!(matches!(
            Region::from_json_str("{ \"Nodes\": [[0.0]], "),
            Err(RegionLoadError::Json(_))
        ));
        assert!(matches!(
            Region::from_json_str(r#"{ "Nodes": [[0.0], [1.0, 2.0]], "Elements": [] }"#),
            Err(RegionLoadError::Format(_))
        ));
        assert!(matches!(
            Region::from_json_str(
                r#"{ "Nodes": [[0.0], [1.0]], "Elements": [{ "shape": "line", "node_ids": [0, 2] }] }"#
            ),
            Err(RegionLoadError::Format(_))
        ));
        assert!(matches!(
            Region::from_json_str(
                r#"{ "Nodes": [[0.0], [1.0]], "Elements": [{ "shape": "square", "node_ids": [0, 1] }] }"#
            ),
            Err(RegionLoadError::Mesh(MeshError::WrongNumberOfNodes { .. }))
        ));
        assert!(matches!(
            Region::from_file("./no_such_region.json"),
            Err(RegionLoadError::Io(_))
        ));
    }

    #[test]
    fn cached_evaluation() {
        let mut region = Region::from_json_str(TWO_SQUARES).unwrap();
        let coordinates = FieldId(0);
        let half = region.add_constant_field("half", &[0.5]);

        let mut cache = FieldCache::new();
        assert_eq!(
            region.evaluate(half, &mut cache, false),
            Err(EvaluationError::NoLocation)
        );

        cache.set_element_xi(0, &[0.5, 0.5]);
        let first = region.evaluate(coordinates, &mut cache, false).unwrap().clone();
        assert!(cache.has_values(coordinates, false));
        let second = region.evaluate(coordinates, &mut cache, false).unwrap().clone();
        assert_eq!(first, second);

        // derivatives were not stored, so they are computed now
        let with_derivatives = region.evaluate(coordinates, &mut cache, true).unwrap();
        assert!(with_derivatives.derivatives.is_some());

        assert_eq!(
            region.evaluate(FieldId(7), &mut cache, false),
            Err(EvaluationError::UnknownField(FieldId(7)))
        );
    }

    #[test]
    fn failed_evaluation_is_not_cached() {
        let mut region = Region::from_json_str(TWO_SQUARES).unwrap();
        let undefined = region.add_finite_element_field(FiniteElementField::new("pressure", 1));

        let mut cache = FieldCache::new();
        cache.set_element_xi(1, &[0.5, 0.5]);
        assert_eq!(
            region.evaluate(undefined, &mut cache, false),
            Err(EvaluationError::NotDefined {
                field: "pressure".to_string(),
                element: 1
            })
        );
        assert!(!cache.has_values(undefined, false));

        cache.set_element_xi(1, &[0.5]);
        assert!(matches!(
            region.evaluate(FieldId(0), &mut cache, false),
            Err(EvaluationError::InvalidLocation { element: 1, expected: 2, found: 1 })
        ));
    }
}
