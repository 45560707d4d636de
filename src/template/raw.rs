use super::{MappingMode, ScaleFactorType, TemplateError};
use crate::basis::Basis;
use crate::nodes::NodeValueLabel;

use smallvec::{smallvec, SmallVec};
use std::sync::Arc;

/// One summed contribution to a function's parameter: a Node value, optionally scaled
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Term {
    pub local_node: usize,
    pub value_label: NodeValueLabel,
    pub version: usize,
    /// Local scale factors whose product multiplies the Node value
    pub scale_factors: SmallVec<[usize; 4]>,
}

impl Default for Term {
    fn default() -> Self {
        Self {
            local_node: 0,
            value_label: NodeValueLabel::Value,
            version: 0,
            scale_factors: SmallVec::new(),
        }
    }
}

/// The parameter mapping of one Basis over an Element, with 0-based numbering throughout.
///
/// Once locked, every mutator fails with [TemplateError::Locked]; use [RawFieldTemplate::clone_for_modify]
/// to obtain an unlocked copy. A failed mutation never changes the template.
#[derive(Clone, Debug)]
pub struct RawFieldTemplate {
    basis: Arc<dyn Basis>,
    locked: bool,
    mapping_mode: MappingMode,
    functions: Vec<SmallVec<[Term; 1]>>,
    number_of_local_nodes: usize,
    scale_factors: Vec<(ScaleFactorType, usize)>,
    simple_unscaled_node_optimisation: bool,
}

impl RawFieldTemplate {
    /// An unlocked template in [MappingMode::Element] mode with a single unscaled term per function
    pub fn new(basis: Arc<dyn Basis>) -> Self {
        let number_of_functions = basis.number_of_functions();
        Self {
            basis,
            locked: false,
            mapping_mode: MappingMode::Element,
            functions: vec![smallvec![Term::default()]; number_of_functions],
            number_of_local_nodes: 0,
            scale_factors: Vec::new(),
            simple_unscaled_node_optimisation: false,
        }
    }

    /// An unlocked copy with the same content
    pub fn clone_for_modify(&self) -> Self {
        let mut copy = self.clone();
        copy.locked = false;
        copy.simple_unscaled_node_optimisation = false;
        copy
    }

    pub fn basis(&self) -> &Arc<dyn Basis> {
        &self.basis
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Make the template read-only, and decide whether evaluation may take the fast path
    pub fn lock(&mut self) {
        if !self.locked {
            self.simple_unscaled_node_optimisation = self.uses_standard_node_mapping();
            self.locked = true;
        }
    }

    /// Only meaningful once locked
    pub fn simple_unscaled_node_optimisation(&self) -> bool {
        self.simple_unscaled_node_optimisation
    }

    fn uses_standard_node_mapping(&self) -> bool {
        self.mapping_mode == MappingMode::Node
            && self.scale_factors.is_empty()
            && self.number_of_local_nodes == self.basis.number_of_nodes()
            && self.functions.len() == self.number_of_local_nodes
            && self.functions.iter().enumerate().all(|(f, terms)| {
                terms.len() == 1 && {
                    let term = &terms[0];
                    term.scale_factors.is_empty()
                        && term.version == 0
                        && term.value_label == NodeValueLabel::Value
                        && term.local_node == f
                        && self.basis.function_node(f) == Some((f, NodeValueLabel::Value))
                }
            })
    }

    fn check_unlocked(&self) -> Result<(), TemplateError> {
        if self.locked {
            Err(TemplateError::Locked)
        } else {
            Ok(())
        }
    }

    fn check_node_mode(&self) -> Result<(), TemplateError> {
        if self.mapping_mode == MappingMode::Node {
            Ok(())
        } else {
            Err(TemplateError::ModeMismatch(self.mapping_mode))
        }
    }

    fn terms(&self, function: usize) -> Result<&SmallVec<[Term; 1]>, TemplateError> {
        self.functions
            .get(function)
            .ok_or(TemplateError::InvalidFunction(function))
    }

    pub(crate) fn term(&self, function: usize, term: usize) -> Result<&Term, TemplateError> {
        self.terms(function)?
            .get(term)
            .ok_or(TemplateError::InvalidTerm { function, term })
    }

    fn term_mut(&mut self, function: usize, term: usize) -> Result<&mut Term, TemplateError> {
        self.functions
            .get_mut(function)
            .ok_or(TemplateError::InvalidFunction(function))?
            .get_mut(term)
            .ok_or(TemplateError::InvalidTerm { function, term })
    }

    pub fn mapping_mode(&self) -> MappingMode {
        self.mapping_mode
    }

    /// Reset to one unscaled term per function in the new mode.
    ///
    /// In [MappingMode::Node] mode, each function's term is initialised to the Basis' standard
    /// Node and value label, with as many local Nodes as the Basis has Nodes.
    pub fn set_mapping_mode(&mut self, mode: MappingMode) -> Result<(), TemplateError> {
        self.check_unlocked()?;

        self.mapping_mode = mode;
        self.scale_factors.clear();

        let basis = &self.basis;
        self.functions = (0..basis.number_of_functions())
            .map(|f| {
                let term = match (mode, basis.function_node(f)) {
                    (MappingMode::Node, Some((local_node, value_label))) => Term {
                        local_node,
                        value_label,
                        ..Term::default()
                    },
                    _ => Term::default(),
                };
                smallvec![term]
            })
            .collect();

        self.number_of_local_nodes = match mode {
            MappingMode::Node => basis.number_of_nodes(),
            _ => 0,
        };

        Ok(())
    }

    pub fn number_of_functions(&self) -> usize {
        self.functions.len()
    }

    pub fn number_of_local_nodes(&self) -> usize {
        self.number_of_local_nodes
    }

    /// Terms referring to local Nodes beyond the new number are kept, but make the template invalid
    pub fn set_number_of_local_nodes(&mut self, number: usize) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.check_node_mode()?;
        if number == 0 {
            return Err(TemplateError::InvalidNumber(number));
        }

        self.number_of_local_nodes = number;
        Ok(())
    }

    pub fn function_number_of_terms(&self, function: usize) -> Result<usize, TemplateError> {
        Ok(self.terms(function)?.len())
    }

    /// Added terms are unscaled and refer to the VALUE of local Node 0. A function with zero terms has a zero parameter.
    pub fn set_function_number_of_terms(&mut self, function: usize, number: usize) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.check_node_mode()?;
        self.terms(function)?;

        self.functions[function].resize(number, Term::default());
        Ok(())
    }

    /// Sum of the number of terms over all functions
    pub fn total_term_count(&self) -> usize {
        self.functions.iter().map(|terms| terms.len()).sum()
    }

    pub fn term_local_node_index(&self, function: usize, term: usize) -> Result<usize, TemplateError> {
        Ok(self.term(function, term)?.local_node)
    }

    pub fn term_node_value_label(&self, function: usize, term: usize) -> Result<NodeValueLabel, TemplateError> {
        Ok(self.term(function, term)?.value_label)
    }

    pub fn term_node_version(&self, function: usize, term: usize) -> Result<usize, TemplateError> {
        Ok(self.term(function, term)?.version)
    }

    pub fn set_term_node_parameter(
        &mut self,
        function: usize,
        term: usize,
        local_node: usize,
        value_label: NodeValueLabel,
        version: usize,
    ) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.check_node_mode()?;
        if local_node >= self.number_of_local_nodes {
            return Err(TemplateError::InvalidLocalNode(local_node));
        }

        let term = self.term_mut(function, term)?;
        term.local_node = local_node;
        term.value_label = value_label;
        term.version = version;
        Ok(())
    }

    pub fn number_of_local_scale_factors(&self) -> usize {
        self.scale_factors.len()
    }

    /// Setting zero unscales every term. Added scale factors are [ScaleFactorType::ElementGeneral], version 0.
    pub fn set_number_of_local_scale_factors(&mut self, number: usize) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.check_node_mode()?;

        self.scale_factors
            .resize(number, (ScaleFactorType::default(), 0));
        if number == 0 {
            self.functions
                .iter_mut()
                .flat_map(|terms| terms.iter_mut())
                .for_each(|term| term.scale_factors.clear());
        }
        Ok(())
    }

    fn scale_factor(&self, index: usize) -> Result<&(ScaleFactorType, usize), TemplateError> {
        self.scale_factors
            .get(index)
            .ok_or(TemplateError::InvalidScaleFactor(index))
    }

    pub fn scale_factor_type(&self, index: usize) -> Result<ScaleFactorType, TemplateError> {
        Ok(self.scale_factor(index)?.0)
    }

    pub fn set_scale_factor_type(&mut self, index: usize, sf_type: ScaleFactorType) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.scale_factor(index)?;
        self.scale_factors[index].0 = sf_type;
        Ok(())
    }

    pub fn scale_factor_version(&self, index: usize) -> Result<usize, TemplateError> {
        Ok(self.scale_factor(index)?.1)
    }

    pub fn set_scale_factor_version(&mut self, index: usize, version: usize) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.scale_factor(index)?;
        self.scale_factors[index].1 = version;
        Ok(())
    }

    /// The local scale factors scaling a term, offset by `start_index` (1 for external numbering)
    pub fn term_scaling(&self, function: usize, term: usize, start_index: usize) -> Result<SmallVec<[usize; 4]>, TemplateError> {
        Ok(self
            .term(function, term)?
            .scale_factors
            .iter()
            .map(|sf| sf + start_index)
            .collect())
    }

    /// Scale a term by the product of the given local scale factors (numbered from `start_index`).
    /// An empty list unscales the term.
    pub fn set_term_scaling(
        &mut self,
        function: usize,
        term: usize,
        indexes: &[usize],
        start_index: usize,
    ) -> Result<(), TemplateError> {
        self.check_unlocked()?;
        self.check_node_mode()?;
        self.term(function, term)?;

        let number_of_scale_factors = self.scale_factors.len();
        let local_indexes = indexes
            .iter()
            .map(|index| match index.checked_sub(start_index) {
                Some(local) if local < number_of_scale_factors => Ok(local),
                _ => Err(TemplateError::InvalidScaleFactor(*index)),
            })
            .collect::<Result<SmallVec<[usize; 4]>, TemplateError>>()?;

        self.term_mut(function, term)?.scale_factors = local_indexes;
        Ok(())
    }

    /// Check every term refers to an existing local Node and local scale factors
    pub fn validate(&self) -> Result<(), TemplateError> {
        if self.mapping_mode != MappingMode::Node {
            return Ok(());
        }

        for (function, terms) in self.functions.iter().enumerate() {
            for (term_index, term) in terms.iter().enumerate() {
                if term.local_node >= self.number_of_local_nodes
                    || term
                        .scale_factors
                        .iter()
                        .any(|sf| *sf >= self.scale_factors.len())
                {
                    return Err(TemplateError::InvalidTemplate {
                        function,
                        term: term_index,
                    });
                }
            }
        }

        Ok(())
    }

    pub(crate) fn function_terms(&self, function: usize) -> &[Term] {
        self.functions.get(function).map_or(&[], |terms| terms.as_slice())
    }
}
