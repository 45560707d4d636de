use super::ElementId;
use crate::nodes::NodeId;

use smallvec::SmallVec;

/// The parametric shape of an Element: the unit line, square or cube
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementShape {
    Line,
    Square,
    Cube,
}

impl ElementShape {
    pub fn from_dimension(dimension: usize) -> Option<Self> {
        match dimension {
            1 => Some(Self::Line),
            2 => Some(Self::Square),
            3 => Some(Self::Cube),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "line" => Some(Self::Line),
            "square" => Some(Self::Square),
            "cube" => Some(Self::Cube),
            _ => None,
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            Self::Line => 1,
            Self::Square => 2,
            Self::Cube => 3,
        }
    }

    pub fn number_of_corners(&self) -> usize {
        1 << self.dimension()
    }

    /// Faces (or end points of a Line) come in low/high pairs along each parametric axis
    pub fn number_of_faces(&self) -> usize {
        2 * self.dimension()
    }

    /// Shape of the faces of this shape (Lines are bounded by Nodes, not Elements)
    pub fn face_shape(&self) -> Option<Self> {
        match self {
            Self::Line => None,
            Self::Square => Some(Self::Line),
            Self::Cube => Some(Self::Square),
        }
    }

    /// The corners on face `face`, in the order they appear on the face Element.
    ///
    /// Face `2k` lies at `xi[k] = 0`, face `2k + 1` at `xi[k] = 1`.
    /// Corners are numbered with xi1 varying fastest.
    pub fn face_local_nodes(&self, face: usize) -> SmallVec<[usize; 4]> {
        let axis = face / 2;
        let side = face % 2;
        (0..self.number_of_corners())
            .filter(|corner| (corner >> axis) & 1 == side)
            .collect()
    }
}

/// An Element of a Mesh: a top-level cell or a face/line of one
#[derive(Clone, Debug)]
pub struct Element {
    pub id: ElementId,
    pub shape: ElementShape,
    /// Corner Nodes (xi1 varying fastest)
    pub nodes: SmallVec<[NodeId; 8]>,
    /// Face Elements, indexed by face number (empty until faces are defined, and for Lines)
    pub faces: SmallVec<[Option<ElementId>; 6]>,
    /// Elements this one is a face of, with the face number within each
    pub parents: SmallVec<[(ElementId, usize); 2]>,
}

impl Element {
    pub fn new(id: ElementId, shape: ElementShape, nodes: &[NodeId]) -> Self {
        Self {
            id,
            shape,
            nodes: SmallVec::from_slice(nodes),
            faces: SmallVec::new(),
            parents: SmallVec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.shape.dimension()
    }

    pub fn is_top_level(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn has_node(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// Corner Nodes sorted by id; used to match faces shared between Elements
    pub(crate) fn sorted_nodes(&self) -> SmallVec<[NodeId; 8]> {
        let mut sorted = self.nodes.clone();
        sorted.sort_unstable();
        sorted
    }
}
