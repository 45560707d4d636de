/// The 0-based, lockable template implementation
pub mod raw;

pub use raw::RawFieldTemplate;

use crate::basis::Basis;
use crate::nodes::NodeValueLabel;

use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

/// Where the parameter weighting each basis function comes from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MappingMode {
    /// Summed (optionally scaled) Node parameters
    Node,
    /// A parameter stored per Element
    Element,
    /// A single parameter for the whole Field
    Constant,
}

/// Identifies scale factors contributed by different Fields, so equivalent ones can be merged
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScaleFactorType {
    ElementGeneral,
    ElementPatch,
    GlobalGeneral,
    GlobalPatch,
    NodeGeneral,
    NodePatch,
}

impl Default for ScaleFactorType {
    fn default() -> Self {
        Self::ElementGeneral
    }
}

/// An Element Field Template: describes how the parameters weighting each function of a
/// [Basis] are assembled for one Field component over an Element.
///
/// Functions, terms, local Nodes, Node versions and scale factors are numbered from 1.
///
/// Templates are shared between the many Elements (and Fields) that use them. Once a
/// template is used by a Field it is locked; modifying it afterwards forks a private,
/// unlocked copy, leaving every other user of the locked template unaffected.
///
/// ```
/// use fem_fields::{ElementFieldTemplate, MappingMode, NodeValueLabel, TensorBasis};
/// use std::sync::Arc;
///
/// let basis = Arc::new(TensorBasis::cubic_hermite(1).unwrap());
/// let mut eft = ElementFieldTemplate::new(basis);
/// eft.set_mapping_mode(MappingMode::Node).unwrap();
/// eft.set_number_of_local_scale_factors(2).unwrap();
/// // scale the first derivative at each end by its own scale factor
/// eft.set_term_scaling(2, 1, &[1]).unwrap();
/// eft.set_term_scaling(4, 1, &[2]).unwrap();
///
/// assert_eq!(eft.term_node_value_label(4, 1), Ok(NodeValueLabel::DDs1));
/// assert_eq!(eft.term_local_node_index(4, 1), Ok(2));
/// ```
#[derive(Clone, Debug)]
pub struct ElementFieldTemplate {
    raw: Arc<RawFieldTemplate>,
}

impl ElementFieldTemplate {
    pub fn new(basis: Arc<dyn Basis>) -> Self {
        Self {
            raw: Arc::new(RawFieldTemplate::new(basis)),
        }
    }

    /// Apply a mutation, first forking an unlocked copy if the template is locked.
    /// The fork only replaces the shared template if the mutation succeeds.
    fn copy_on_write<F>(&mut self, mutation: F) -> Result<(), TemplateError>
    where
        F: FnOnce(&mut RawFieldTemplate) -> Result<(), TemplateError>,
    {
        if self.raw.is_locked() {
            let mut copy = self.raw.clone_for_modify();
            mutation(&mut copy)?;
            self.raw = Arc::new(copy);
            Ok(())
        } else {
            mutation(Arc::make_mut(&mut self.raw))
        }
    }

    /// Validate and lock the template, returning the shared handle Fields hold on to
    pub(crate) fn lock_for_use(&mut self) -> Result<Arc<RawFieldTemplate>, TemplateError> {
        if !self.raw.is_locked() {
            self.validate()?;
            Arc::make_mut(&mut self.raw).lock();
        }
        Ok(Arc::clone(&self.raw))
    }

    pub fn raw(&self) -> &RawFieldTemplate {
        &self.raw
    }

    /// Whether both templates currently refer to the same shared template
    pub fn shares_template_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.raw, &other.raw)
    }

    pub fn basis(&self) -> &Arc<dyn Basis> {
        self.raw.basis()
    }

    pub fn is_locked(&self) -> bool {
        self.raw.is_locked()
    }

    pub fn validate(&self) -> Result<(), TemplateError> {
        self.raw.validate().map_err(one_based)
    }

    pub fn mapping_mode(&self) -> MappingMode {
        self.raw.mapping_mode()
    }

    pub fn set_mapping_mode(&mut self, mode: MappingMode) -> Result<(), TemplateError> {
        self.copy_on_write(|raw| raw.set_mapping_mode(mode))
    }

    pub fn number_of_functions(&self) -> usize {
        self.raw.number_of_functions()
    }

    pub fn number_of_local_nodes(&self) -> usize {
        self.raw.number_of_local_nodes()
    }

    pub fn set_number_of_local_nodes(&mut self, number: usize) -> Result<(), TemplateError> {
        self.copy_on_write(|raw| raw.set_number_of_local_nodes(number))
    }

    pub fn function_number_of_terms(&self, function: usize) -> Result<usize, TemplateError> {
        self.raw
            .function_number_of_terms(function_index(function)?)
            .map_err(one_based)
    }

    pub fn set_function_number_of_terms(&mut self, function: usize, number: usize) -> Result<(), TemplateError> {
        let function = function_index(function)?;
        self.copy_on_write(|raw| raw.set_function_number_of_terms(function, number))
            .map_err(one_based)
    }

    pub fn total_term_count(&self) -> usize {
        self.raw.total_term_count()
    }

    pub fn term_local_node_index(&self, function: usize, term: usize) -> Result<usize, TemplateError> {
        let (function, term) = term_index(function, term)?;
        Ok(self.raw.term_local_node_index(function, term).map_err(one_based)? + 1)
    }

    pub fn term_node_value_label(&self, function: usize, term: usize) -> Result<NodeValueLabel, TemplateError> {
        let (function, term) = term_index(function, term)?;
        self.raw.term_node_value_label(function, term).map_err(one_based)
    }

    pub fn term_node_version(&self, function: usize, term: usize) -> Result<usize, TemplateError> {
        let (function, term) = term_index(function, term)?;
        Ok(self.raw.term_node_version(function, term).map_err(one_based)? + 1)
    }

    pub fn set_term_node_parameter(
        &mut self,
        function: usize,
        term: usize,
        local_node: usize,
        value_label: NodeValueLabel,
        version: usize,
    ) -> Result<(), TemplateError> {
        let (function, term) = term_index(function, term)?;
        let local_node = local_node
            .checked_sub(1)
            .ok_or(TemplateError::InvalidLocalNode(local_node))?;
        let version = version
            .checked_sub(1)
            .ok_or(TemplateError::InvalidVersion(version))?;

        self.copy_on_write(|raw| {
            raw.set_term_node_parameter(function, term, local_node, value_label, version)
        })
        .map_err(one_based)
    }

    pub fn number_of_local_scale_factors(&self) -> usize {
        self.raw.number_of_local_scale_factors()
    }

    pub fn set_number_of_local_scale_factors(&mut self, number: usize) -> Result<(), TemplateError> {
        self.copy_on_write(|raw| raw.set_number_of_local_scale_factors(number))
    }

    pub fn scale_factor_type(&self, index: usize) -> Result<ScaleFactorType, TemplateError> {
        self.raw
            .scale_factor_type(scale_factor_index(index)?)
            .map_err(one_based)
    }

    pub fn set_scale_factor_type(&mut self, index: usize, sf_type: ScaleFactorType) -> Result<(), TemplateError> {
        let index = scale_factor_index(index)?;
        self.copy_on_write(|raw| raw.set_scale_factor_type(index, sf_type))
            .map_err(one_based)
    }

    pub fn scale_factor_version(&self, index: usize) -> Result<usize, TemplateError> {
        let version = self
            .raw
            .scale_factor_version(scale_factor_index(index)?)
            .map_err(one_based)?;
        Ok(version + 1)
    }

    pub fn set_scale_factor_version(&mut self, index: usize, version: usize) -> Result<(), TemplateError> {
        let index = scale_factor_index(index)?;
        let version = version
            .checked_sub(1)
            .ok_or(TemplateError::InvalidVersion(version))?;
        self.copy_on_write(|raw| raw.set_scale_factor_version(index, version))
            .map_err(one_based)
    }

    pub fn term_scaling(&self, function: usize, term: usize) -> Result<SmallVec<[usize; 4]>, TemplateError> {
        let (function, term) = term_index(function, term)?;
        self.raw.term_scaling(function, term, 1).map_err(one_based)
    }

    pub fn set_term_scaling(&mut self, function: usize, term: usize, indexes: &[usize]) -> Result<(), TemplateError> {
        let (function, term) = term_index(function, term)?;
        let indexes = indexes
            .iter()
            .map(|index| scale_factor_index(*index))
            .collect::<Result<SmallVec<[usize; 4]>, TemplateError>>()?;
        self.copy_on_write(|raw| raw.set_term_scaling(function, term, &indexes, 0))
            .map_err(one_based)
    }
}

fn function_index(function: usize) -> Result<usize, TemplateError> {
    function
        .checked_sub(1)
        .ok_or(TemplateError::InvalidFunction(function))
}

fn term_index(function: usize, term: usize) -> Result<(usize, usize), TemplateError> {
    let function_idx = function_index(function)?;
    let term_idx = term
        .checked_sub(1)
        .ok_or(TemplateError::InvalidTerm { function, term })?;
    Ok((function_idx, term_idx))
}

fn scale_factor_index(index: usize) -> Result<usize, TemplateError> {
    index
        .checked_sub(1)
        .ok_or(TemplateError::InvalidScaleFactor(index))
}

/// Renumber an error from the 0-based template from 1, as callers of the wrapper count
fn one_based(err: TemplateError) -> TemplateError {
    err.offset(1)
}

/// The Error Type for invalid Element Field Template operations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateError {
    Locked,
    InvalidFunction(usize),
    InvalidTerm { function: usize, term: usize },
    InvalidLocalNode(usize),
    InvalidScaleFactor(usize),
    InvalidNumber(usize),
    InvalidVersion(usize),
    ModeMismatch(MappingMode),
    InvalidTemplate { function: usize, term: usize },
}

impl TemplateError {
    /// The same error with every function, term, local Node and scale factor number shifted by `by`
    pub fn offset(self, by: usize) -> Self {
        match self {
            Self::InvalidFunction(function) => Self::InvalidFunction(function + by),
            Self::InvalidTerm { function, term } => Self::InvalidTerm {
                function: function + by,
                term: term + by,
            },
            Self::InvalidLocalNode(node) => Self::InvalidLocalNode(node + by),
            Self::InvalidScaleFactor(index) => Self::InvalidScaleFactor(index + by),
            Self::InvalidTemplate { function, term } => Self::InvalidTemplate {
                function: function + by,
                term: term + by,
            },
            other => other,
        }
    }
}

impl std::error::Error for TemplateError {}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Locked => write!(f, "Template is locked; Cannot modify Template!"),
            Self::InvalidFunction(function) => {
                write!(f, "Template has no function {}; Cannot access function!", function)
            }
            Self::InvalidTerm { function, term } => write!(
                f,
                "Template function {} has no term {}; Cannot access term!",
                function, term
            ),
            Self::InvalidLocalNode(node) => write!(
                f,
                "Local Node {} is out of range; Cannot map term to Node!",
                node
            ),
            Self::InvalidScaleFactor(index) => write!(
                f,
                "Local scale factor {} is out of range; Cannot access scale factor!",
                index
            ),
            Self::InvalidNumber(number) => {
                write!(f, "{} is not a valid count; Cannot modify Template!", number)
            }
            Self::InvalidVersion(version) => write!(
                f,
                "{} is not a valid version (versions start at 1); Cannot modify Template!",
                version
            ),
            Self::ModeMismatch(mode) => write!(
                f,
                "Operation requires Node mapping, Template uses {:?} mapping; Cannot modify Template!",
                mode
            ),
            Self::InvalidTemplate { function, term } => write!(
                f,
                "Term {} of function {} refers to a missing local Node or scale factor; Template is not valid!",
                term, function
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basis::TensorBasis;

    fn bilinear_node_template() -> ElementFieldTemplate {
        let mut eft = ElementFieldTemplate::new(Arc::new(TensorBasis::linear_lagrange(2).unwrap()));
        eft.set_mapping_mode(MappingMode::Node).unwrap();
        eft
    }

    #[test]
    fn one_based_numbering() {
        let mut eft = bilinear_node_template();
        assert_eq!(eft.term_local_node_index(1, 1), Ok(1));
        assert_eq!(eft.term_local_node_index(4, 1), Ok(4));
        assert_eq!(eft.term_node_version(4, 1), Ok(1));

        assert_eq!(eft.function_number_of_terms(0), Err(TemplateError::InvalidFunction(0)));
        assert_eq!(
            eft.set_term_node_parameter(1, 1, 0, NodeValueLabel::Value, 1),
            Err(TemplateError::InvalidLocalNode(0))
        );
        assert_eq!(
            eft.set_term_node_parameter(1, 1, 1, NodeValueLabel::Value, 0),
            Err(TemplateError::InvalidVersion(0))
        );

        eft.set_term_node_parameter(2, 1, 3, NodeValueLabel::DDs1, 2).unwrap();
        assert_eq!(eft.term_local_node_index(2, 1), Ok(3));
        assert_eq!(eft.term_node_version(2, 1), Ok(2));
        assert_eq!(eft.raw().term_node_version(1, 0), Ok(1));
    }

    #[test]
    fn copy_on_write() {
        let mut eft = bilinear_node_template();
        let in_use = eft.lock_for_use().unwrap();
        let mut other = eft.clone();
        assert!(eft.is_locked());
        assert!(eft.shares_template_with(&other));

        // a write to one user forks it, other users keep the locked template
        other.set_function_number_of_terms(1, 2).unwrap();
        assert!(!other.is_locked());
        assert!(!other.shares_template_with(&eft));
        assert_eq!(other.function_number_of_terms(1), Ok(2));
        assert_eq!(eft.function_number_of_terms(1), Ok(1));
        assert_eq!(in_use.function_number_of_terms(0), Ok(1));
        assert!(Arc::ptr_eq(&in_use, &eft.raw));
    }

    #[test]
    fn errors_report_caller_numbering() {
        let mut eft = bilinear_node_template();

        assert_eq!(eft.function_number_of_terms(5), Err(TemplateError::InvalidFunction(5)));
        assert_eq!(
            eft.term_node_value_label(1, 2),
            Err(TemplateError::InvalidTerm { function: 1, term: 2 })
        );
        assert_eq!(
            eft.set_term_node_parameter(1, 1, 5, NodeValueLabel::Value, 1),
            Err(TemplateError::InvalidLocalNode(5))
        );
        assert_eq!(eft.scale_factor_type(1), Err(TemplateError::InvalidScaleFactor(1)));

        eft.set_number_of_local_scale_factors(2).unwrap();
        assert_eq!(
            eft.set_term_scaling(1, 1, &[1, 3]),
            Err(TemplateError::InvalidScaleFactor(3))
        );
        assert_eq!(
            eft.set_term_scaling(1, 1, &[0]),
            Err(TemplateError::InvalidScaleFactor(0))
        );
        eft.set_term_scaling(1, 1, &[2, 1]).unwrap();
        assert_eq!(eft.term_scaling(1, 1).unwrap().as_slice(), &[2, 1]);
    }

    #[test]
    fn rejected_write_on_locked_template_does_not_fork() {
        let mut eft = bilinear_node_template();
        eft.lock_for_use().unwrap();
        let user = eft.clone();

        assert_eq!(
            eft.set_term_node_parameter(1, 1, 5, NodeValueLabel::Value, 1),
            Err(TemplateError::InvalidLocalNode(5))
        );
        assert!(eft.is_locked());
        assert!(eft.shares_template_with(&user));
    }

    #[test]
    fn invalid_templates_are_not_locked() {
        let mut eft = bilinear_node_template();
        eft.set_number_of_local_nodes(3).unwrap();
        assert_eq!(
            eft.lock_for_use().map(|_| ()),
            Err(TemplateError::InvalidTemplate { function: 4, term: 1 })
        );
        assert!(!eft.is_locked());
    }

    #[test]
    fn element_mode_rejects_node_operations() {
        let mut eft = ElementFieldTemplate::new(Arc::new(TensorBasis::linear_lagrange(1).unwrap()));
        assert_eq!(
            eft.set_function_number_of_terms(1, 2),
            Err(TemplateError::ModeMismatch(MappingMode::Element))
        );
        assert_eq!(
            eft.set_number_of_local_scale_factors(1),
            Err(TemplateError::ModeMismatch(MappingMode::Element))
        );
        eft.set_mapping_mode(MappingMode::Constant).unwrap();
        assert_eq!(eft.mapping_mode(), MappingMode::Constant);
        assert_eq!(eft.number_of_local_nodes(), 0);
    }
}
