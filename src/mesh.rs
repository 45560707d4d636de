/// Elements and their parametric shapes
pub mod element;
/// Affine maps between the parametric spaces of Elements and their faces
pub mod xi_map;

pub use element::{Element, ElementShape};
pub use xi_map::XiMap;

use crate::nodes::NodeId;
use crate::MAX_XI_DIMENSIONS;

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::fmt;

/// Elements are identified by their index in the Mesh
pub type ElementId = usize;

/// The Elements of a Region, and the face relationships between them.
///
/// Top-level Elements are added with [Mesh::add_element]. Their faces (and the faces of
/// those faces) are created by [Mesh::define_faces], which shares a single face Element
/// between all the Elements that have the same face.
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    elements: Vec<Element>,
    faces_defined: bool,
}

impl Mesh {
    /// Construct a completely empty Mesh
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn add_element(&mut self, shape: ElementShape, nodes: &[NodeId]) -> Result<ElementId, MeshError> {
        if nodes.len() != shape.number_of_corners() {
            return Err(MeshError::WrongNumberOfNodes {
                expected: shape.number_of_corners(),
                found: nodes.len(),
            });
        }

        let mut sorted: SmallVec<[NodeId; 8]> = SmallVec::from_slice(nodes);
        sorted.sort_unstable();
        sorted.dedup();
        if sorted.len() != nodes.len() {
            return Err(MeshError::DuplicateNodes);
        }

        self.faces_defined = false;
        Ok(self.push_element(shape, nodes))
    }

    fn push_element(&mut self, shape: ElementShape, nodes: &[NodeId]) -> ElementId {
        let id = self.elements.len();
        self.elements.push(Element::new(id, shape, nodes));
        id
    }

    pub fn element(&self, id: ElementId) -> Result<&Element, MeshError> {
        self.elements
            .get(id)
            .ok_or(MeshError::ElementDoesNotExist(id))
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.iter()
    }

    pub fn top_level_elements(&self) -> impl Iterator<Item = &Element> + '_ {
        self.elements.iter().filter(|e| e.is_top_level())
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn faces_defined(&self) -> bool {
        self.faces_defined
    }

    /// Create (or find) the face Elements of every Square and Cube; Cubes first so their
    /// faces get lines as well.
    ///
    /// Faces are matched by their set of corner Nodes. A new face Element takes its corner
    /// order from the first Element it is found on.
    pub fn define_faces(&mut self) -> Result<(), MeshError> {
        for dimension in (2..=MAX_XI_DIMENSIONS).rev() {
            let mut face_ids: BTreeMap<SmallVec<[NodeId; 8]>, ElementId> = self
                .elements
                .iter()
                .filter(|e| e.dimension() == dimension - 1)
                .map(|e| (e.sorted_nodes(), e.id))
                .collect();

            let owner_ids: Vec<ElementId> = self
                .elements
                .iter()
                .filter(|e| e.dimension() == dimension)
                .map(|e| e.id)
                .collect();

            for owner_id in owner_ids {
                let shape = self.elements[owner_id].shape;
                let face_shape = shape
                    .face_shape()
                    .ok_or(MeshError::InvalidFaceShape { shape, face: 0 })?;

                if self.elements[owner_id].faces.len() != shape.number_of_faces() {
                    self.elements[owner_id].faces = SmallVec::from_elem(None, shape.number_of_faces());
                }

                for face in 0..shape.number_of_faces() {
                    if self.elements[owner_id].faces[face].is_some() {
                        continue;
                    }

                    let face_nodes: SmallVec<[NodeId; 8]> = shape
                        .face_local_nodes(face)
                        .iter()
                        .map(|local| self.elements[owner_id].nodes[*local])
                        .collect();
                    let mut key = face_nodes.clone();
                    key.sort_unstable();

                    let face_id = match face_ids.get(&key) {
                        Some(face_id) => *face_id,
                        None => {
                            let face_id = self.push_element(face_shape, &face_nodes);
                            face_ids.insert(key, face_id);
                            face_id
                        }
                    };

                    trace!("Element {} face {} -> Element {}", owner_id, face, face_id);
                    self.elements[owner_id].faces[face] = Some(face_id);
                    self.elements[face_id].parents.push((owner_id, face));
                }
            }
        }

        self.faces_defined = true;
        debug!("Defined faces; Mesh has {} Elements", self.elements.len());
        Ok(())
    }

    /// Elements on the other side of face `index` (or, for a Line, of its Node `index`).
    ///
    /// Lines are adjacent when they share a Node and are both top-level or both faces.
    /// Other Elements are adjacent when they share a face Element. The result is ordered
    /// by Element id.
    pub fn adjacent_elements(&self, element_id: ElementId, index: usize) -> Result<Vec<ElementId>, MeshError> {
        let element = self.element(element_id)?;
        if index >= element.shape.number_of_faces() {
            return Err(MeshError::InvalidFaceNumber {
                element: element_id,
                face: index,
            });
        }

        if element.shape == ElementShape::Line {
            let node = element.nodes[index];
            return Ok(self
                .elements
                .iter()
                .filter(|other| {
                    other.id != element_id
                        && other.shape == ElementShape::Line
                        && other.is_top_level() == element.is_top_level()
                        && other.has_node(node)
                })
                .map(|other| other.id)
                .collect());
        }

        let face_id = element
            .faces
            .get(index)
            .copied()
            .flatten()
            .ok_or(MeshError::FacesNotDefined)?;

        let mut adjacent: Vec<ElementId> = self
            .element(face_id)?
            .parents
            .iter()
            .map(|(parent_id, _)| *parent_id)
            .filter(|parent_id| *parent_id != element_id)
            .collect();
        adjacent.sort_unstable();
        adjacent.dedup();
        Ok(adjacent)
    }

    /// The top-level Element above `element_id` (following first parents), and the map
    /// from `element_id`'s parametric space into the top-level Element's
    pub fn top_level_conversion(&self, element_id: ElementId) -> Result<(ElementId, XiMap), MeshError> {
        self.top_level_conversion_where(element_id, |_| true)?
            .ok_or(MeshError::NoTopLevelElement(element_id))
    }

    /// The first top-level Element above `element_id` accepted by `accept`, with the map
    /// from `element_id`'s parametric space into it.
    ///
    /// Parents are tried depth first in the order they were attached, so the first
    /// accepted ancestor along first parents wins. `None` if no ancestor is accepted.
    pub fn top_level_conversion_where<P>(
        &self,
        element_id: ElementId,
        mut accept: P,
    ) -> Result<Option<(ElementId, XiMap)>, MeshError>
    where
        P: FnMut(ElementId) -> bool,
    {
        let start = self.element(element_id)?;
        let mut to_be_checked = vec![(start, XiMap::identity(start.dimension()), 0)];

        while let Some((current, map, depth)) = to_be_checked.pop() {
            if current.parents.is_empty() {
                if accept(current.id) {
                    return Ok(Some((current.id, map)));
                }
                continue;
            }
            if depth == MAX_XI_DIMENSIONS {
                return Err(MeshError::NoTopLevelElement(element_id));
            }

            for (parent_id, face) in current.parents.iter().rev() {
                let parent = self.element(*parent_id)?;
                let parent_map = face_xi_map(parent.shape, *face)?.compose(&map);
                to_be_checked.push((parent, parent_map, depth + 1));
            }
        }

        Ok(None)
    }
}

/// The map from the parametric space of face `face` into that of `shape`.
///
/// The face coordinates follow the remaining parent axes in increasing order.
pub fn face_xi_map(shape: ElementShape, face: usize) -> Result<XiMap, MeshError> {
    let dimension = shape.dimension();
    if dimension < 2 || face >= shape.number_of_faces() {
        return Err(MeshError::InvalidFaceShape { shape, face });
    }

    let axis = face / 2;
    let mut offset = DVector::zeros(dimension);
    offset[axis] = (face % 2) as f64;

    let mut jacobian = DMatrix::zeros(dimension, dimension - 1);
    for (column, parent_axis) in (0..dimension).filter(|a| *a != axis).enumerate() {
        jacobian[(parent_axis, column)] = 1.0;
    }

    Ok(XiMap { offset, jacobian })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    ElementDoesNotExist(ElementId),
    WrongNumberOfNodes { expected: usize, found: usize },
    DuplicateNodes,
    InvalidFaceNumber { element: ElementId, face: usize },
    InvalidFaceShape { shape: ElementShape, face: usize },
    FacesNotDefined,
    NoTopLevelElement(ElementId),
    XiDimensionMismatch { expected: usize, found: usize },
}

impl std::error::Error for MeshError {}

impl fmt::Display for MeshError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ElementDoesNotExist(id) => {
                write!(f, "Element {} does not exist; Cannot access Element!", id)
            }
            Self::WrongNumberOfNodes { expected, found } => write!(
                f,
                "Element shape requires {} Nodes, {} were given; Cannot add Element!",
                expected, found
            ),
            Self::DuplicateNodes => write!(f, "Element has duplicate Nodes; Cannot add Element!"),
            Self::InvalidFaceNumber { element, face } => write!(
                f,
                "Element {} has no face {}; Cannot find adjacent Elements!",
                element, face
            ),
            Self::InvalidFaceShape { shape, face } => write!(
                f,
                "{:?} has no face Element {}; Cannot map to face!",
                shape, face
            ),
            Self::FacesNotDefined => write!(
                f,
                "Faces have not been defined for this Mesh; Cannot find adjacent Elements!"
            ),
            Self::NoTopLevelElement(id) => write!(
                f,
                "Element {} has no top-level ancestor; Cannot convert to top-level Element!",
                id
            ),
            Self::XiDimensionMismatch { expected, found } => write!(
                f,
                "Expected {} xi coordinates but {} were given; Cannot map xi!",
                expected, found
            ),
        }
    }
}
