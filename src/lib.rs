//! Finite Element Fields over meshes of 1D, 2D and 3D Elements.
//!
//! Fields are described per Element by [template::ElementFieldTemplate]s which map
//! [basis::Basis] functions onto node parameters, element parameters or constants.
//! They are evaluated (with parametric derivatives) at arbitrary `xi` locations through a
//! [fields::Region] and an explicit [fields::FieldCache].
//!
//! The [integration] module builds the "integration" field: a piecewise affine coordinate
//! obtained by integrating a scalar field outward from a seed Element across Element adjacency.

/// Interpolation functions defined over the parametric space of an Element
pub mod basis;
/// Fields, their evaluation caches, and the Region that owns them
pub mod fields;
/// Integration of a scalar field across adjacent Elements
pub mod integration;
/// Elements, faces, adjacency and conversions to top-level Elements
pub mod mesh;
/// Parameters stored at Nodes
pub mod nodes;
/// Element Field Templates: the mapping from basis functions to parameters
pub mod template;

use smallvec::SmallVec;

/// Largest parametric dimension of any Element
pub const MAX_XI_DIMENSIONS: usize = 3;

/// Largest number of coordinate field components accepted by the integration field
pub const MAX_COORDINATE_COMPONENTS: usize = 3;

/// A location in the parametric space of an Element
pub type Xi = SmallVec<[f64; MAX_XI_DIMENSIONS]>;

pub use basis::{Basis, BasisFunctionType, TensorBasis};
pub use fields::{Field, FieldCache, FieldId, FieldValues, FiniteElementField, Region};
pub use integration::{IntegrationField, IntegrationMapping, QuadratureRule};
pub use mesh::{ElementId, ElementShape, Mesh};
pub use nodes::{NodeId, NodeValueLabel};
pub use template::{ElementFieldTemplate, MappingMode, ScaleFactorType};
