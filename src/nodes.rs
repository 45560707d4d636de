use std::collections::BTreeMap;
use std::fmt;

/// Nodes are identified by a unique id within a Region
pub type NodeId = usize;

/// The physical kind of a parameter stored at a Node: its value or one of its
/// (cross) derivatives with respect to the nodal arc-length directions `s1`, `s2`, `s3`
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeValueLabel {
    Value,
    DDs1,
    DDs2,
    D2Ds1Ds2,
    DDs3,
    D2Ds1Ds3,
    D2Ds2Ds3,
    D3Ds1Ds2Ds3,
}

impl NodeValueLabel {
    /// Label of the derivative taken in every direction whose bit is set (bit 0: `s1`, bit 1: `s2`, bit 2: `s3`)
    pub fn from_derivative_mask(mask: u8) -> Option<Self> {
        match mask {
            0 => Some(Self::Value),
            1 => Some(Self::DDs1),
            2 => Some(Self::DDs2),
            3 => Some(Self::D2Ds1Ds2),
            4 => Some(Self::DDs3),
            5 => Some(Self::D2Ds1Ds3),
            6 => Some(Self::D2Ds2Ds3),
            7 => Some(Self::D3Ds1Ds2Ds3),
            _ => None,
        }
    }

    pub fn derivative_mask(&self) -> u8 {
        match self {
            Self::Value => 0,
            Self::DDs1 => 1,
            Self::DDs2 => 2,
            Self::D2Ds1Ds2 => 3,
            Self::DDs3 => 4,
            Self::D2Ds1Ds3 => 5,
            Self::D2Ds2Ds3 => 6,
            Self::D3Ds1Ds2Ds3 => 7,
        }
    }
}

impl fmt::Display for NodeValueLabel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Self::Value => "VALUE",
            Self::DDs1 => "D_DS1",
            Self::DDs2 => "D_DS2",
            Self::D2Ds1Ds2 => "D2_DS1DS2",
            Self::DDs3 => "D_DS3",
            Self::D2Ds1Ds3 => "D2_DS1DS3",
            Self::D2Ds2Ds3 => "D2_DS2DS3",
            Self::D3Ds1Ds2Ds3 => "D3_DS1DS2DS3",
        };
        write!(f, "{}", name)
    }
}

/// Parameters of one Field stored at Nodes, keyed by component, value label and version.
///
/// Versions are 0-based and disambiguate multiple parameter sets for the same label at a
/// shared Node (e.g. a different derivative on each side of a slope discontinuity).
#[derive(Clone, Debug, Default)]
pub struct NodeParameters {
    values: BTreeMap<(NodeId, usize, NodeValueLabel, usize), f64>,
}

impl NodeParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_value(
        &mut self,
        node: NodeId,
        component: usize,
        label: NodeValueLabel,
        version: usize,
        value: f64,
    ) {
        self.values.insert((node, component, label, version), value);
    }

    pub fn value(
        &self,
        node: NodeId,
        component: usize,
        label: NodeValueLabel,
        version: usize,
    ) -> Option<f64> {
        self.values.get(&(node, component, label, version)).copied()
    }

    /// Number of consecutive versions (starting at 0) stored for a label
    pub fn number_of_versions(&self, node: NodeId, component: usize, label: NodeValueLabel) -> usize {
        (0..)
            .take_while(|v| self.values.contains_key(&(node, component, label, *v)))
            .count()
    }

    pub fn is_defined_at_node(&self, node: NodeId) -> bool {
        self.values
            .range((node, 0, NodeValueLabel::Value, 0)..)
            .next()
            .map_or(false, |((n, _, _, _), _)| *n == node)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_masks() {
        for mask in 0..8 {
            let label = NodeValueLabel::from_derivative_mask(mask).unwrap();
            assert_eq!(label.derivative_mask(), mask);
        }
        assert_eq!(NodeValueLabel::from_derivative_mask(8), None);
        assert_eq!(format!("{}", NodeValueLabel::D2Ds1Ds2), "D2_DS1DS2");
    }

    #[test]
    fn versions() {
        let mut params = NodeParameters::new();
        params.set_value(3, 0, NodeValueLabel::DDs1, 0, 1.0);
        params.set_value(3, 0, NodeValueLabel::DDs1, 1, -1.0);
        params.set_value(3, 0, NodeValueLabel::DDs1, 3, 4.0);

        assert_eq!(params.number_of_versions(3, 0, NodeValueLabel::DDs1), 2);
        assert_eq!(params.number_of_versions(3, 1, NodeValueLabel::DDs1), 0);
        assert_eq!(params.value(3, 0, NodeValueLabel::DDs1, 1), Some(-1.0));
        assert_eq!(params.value(3, 0, NodeValueLabel::Value, 0), None);
    }

    #[test]
    fn defined_at_node() {
        let mut params = NodeParameters::new();
        params.set_value(2, 1, NodeValueLabel::DDs2, 0, 0.5);

        assert!(params.is_defined_at_node(2));
        assert!(!params.is_defined_at_node(1));
        assert!(!params.is_defined_at_node(3));
        assert_eq!(params.len(), 1);
    }
}
