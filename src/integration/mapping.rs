use super::{IntegrationError, QuadratureRule};
use crate::fields::{EvaluationError, FieldCache, FieldId, Region};
use crate::mesh::ElementId;
use crate::{Xi, MAX_COORDINATE_COMPONENTS};

#[cfg(feature = "json_export")]
use json::{object, JsonValue};
use log::{debug, trace, warn};
use smallvec::smallvec;
use std::collections::{BTreeMap, VecDeque};

/// The affine frame of one Element: the integrated value at its `xi = 0` corner, and
/// the rate of change along each xi direction
#[derive(Clone, Debug, PartialEq)]
pub struct ElementMapping {
    pub offset: Xi,
    pub differentials: Xi,
}

impl ElementMapping {
    /// Zero offset and unit differentials
    pub fn new(dimension: usize) -> Self {
        Self {
            offset: smallvec![0.0; dimension],
            differentials: smallvec![1.0; dimension],
        }
    }

    pub fn dimension(&self) -> usize {
        self.offset.len()
    }
}

/// The frames of every Element reached from a seed Element, in the order they were reached
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IntegrationMapping {
    mappings: BTreeMap<ElementId, ElementMapping>,
    order: Vec<ElementId>,
}

impl IntegrationMapping {
    pub fn get(&self, element: ElementId) -> Option<&ElementMapping> {
        self.mappings.get(&element)
    }

    pub fn contains(&self, element: ElementId) -> bool {
        self.mappings.contains_key(&element)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Elements in the order they were reached
    pub fn visit_order(&self) -> &[ElementId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (ElementId, &ElementMapping)> + '_ {
        self.order
            .iter()
            .filter_map(move |element| self.mappings.get(element).map(|m| (*element, m)))
    }

    pub(crate) fn insert(&mut self, element: ElementId, mapping: ElementMapping) {
        if self.mappings.insert(element, mapping).is_none() {
            self.order.push(element);
        }
    }

    /// The first Element (trying `hint` first) whose offset equals `offset` exactly
    pub fn find_by_offset(&self, offset: &[f64], hint: Option<ElementId>) -> Option<ElementId> {
        let matches = |element: &ElementId| {
            self.mappings
                .get(element)
                .map_or(false, |m| m.offset.as_slice() == offset)
        };

        hint.filter(matches)
            .or_else(|| self.order.iter().copied().find(|e| matches(e)))
    }

    /// Integrate `integrand` outward from `seed`, breadth first across Element adjacency.
    ///
    /// The seed has a zero offset. Each Element's differential along xi `k` is the integral
    /// of `integrand × |dX/dxi_k|` along the line through the Element's centre. An Element
    /// reached across its low face on axis `k` is offset by minus its own differential; one
    /// reached across its high face by plus the current Element's differential. An Element
    /// keeps the frame it was first given, even if a cycle in the Mesh would give it another.
    pub fn build(
        region: &Region,
        seed: ElementId,
        integrand: FieldId,
        coordinate: FieldId,
        rule: QuadratureRule,
    ) -> Result<Self, IntegrationError> {
        let dimension = check_inputs(region, seed, integrand, coordinate)?;

        let mut sampler = EdgeSampler::new(region, integrand, coordinate, rule);
        let result = Self::traverse(region, seed, dimension, |element| {
            Ok(sampler.differentials(element, dimension)?)
        });

        finish("build", seed, result, &mut sampler)
    }

    /// Advance a 1D mapping by one time step of an upwind advection scheme.
    ///
    /// The seed is updated as if entered across its high face from a frame with the seed's
    /// previous offset and a differential of `time_step`. Every other Element is updated
    /// from its previous frame and the new frame of the Element it is reached from (see
    /// [upwind_step]).
    pub fn update_time_step(
        region: &Region,
        seed: ElementId,
        previous: &IntegrationMapping,
        integrand: FieldId,
        coordinate: FieldId,
        time_step: f64,
        rule: QuadratureRule,
    ) -> Result<Self, IntegrationError> {
        let dimension = check_inputs(region, seed, integrand, coordinate)?;
        if dimension != 1 {
            return Err(IntegrationError::NotOneDimensional(dimension));
        }

        let previous_seed = previous
            .get(seed)
            .ok_or(IntegrationError::MissingPreviousMapping(seed))?;
        let anchor = ElementMapping {
            offset: previous_seed.offset.clone(),
            differentials: smallvec![time_step],
        };

        let mut sampler = EdgeSampler::new(region, integrand, coordinate, rule);
        let mut step = |element: ElementId,
                        face: usize,
                        from: &ElementMapping|
         -> Result<ElementMapping, IntegrationError> {
            let previous_mapping = previous
                .get(element)
                .ok_or(IntegrationError::MissingPreviousMapping(element))?;
            let (flow_step, length) = sampler.flow_and_length(element, time_step)?;
            Ok(upwind_step(previous_mapping, from, face, flow_step, length))
        };

        let seed_mapping = step(seed, 1, &anchor);
        let result = seed_mapping.and_then(|seed_mapping| {
            Self::traverse_from(region, seed, seed_mapping, |element, face, from| {
                step(element, face, from)
            })
        });

        finish("time step update", seed, result, &mut sampler)
    }

    fn traverse<F>(region: &Region, seed: ElementId, dimension: usize, mut differentials: F) -> Result<Self, IntegrationError>
    where
        F: FnMut(ElementId) -> Result<Xi, IntegrationError>,
    {
        let seed_mapping = ElementMapping {
            offset: smallvec![0.0; dimension],
            differentials: differentials(seed)?,
        };

        Self::traverse_from(region, seed, seed_mapping, |element, face, current| {
            let differentials = differentials(element)?;
            let axis = face / 2;
            let mut offset = current.offset.clone();
            if face % 2 == 0 {
                offset[axis] -= differentials[axis];
            } else {
                offset[axis] += current.differentials[axis];
            }
            Ok(ElementMapping {
                offset,
                differentials,
            })
        })
    }

    /// Breadth first traversal from a mapped seed; `map_neighbour` gives the frame of an
    /// unmapped Element reached across `face` of an Element with frame `current`
    fn traverse_from<F>(
        region: &Region,
        seed: ElementId,
        seed_mapping: ElementMapping,
        mut map_neighbour: F,
    ) -> Result<Self, IntegrationError>
    where
        F: FnMut(ElementId, usize, &ElementMapping) -> Result<ElementMapping, IntegrationError>,
    {
        let number_of_faces = 2 * seed_mapping.dimension();
        let mut mapping = Self::default();
        mapping.insert(seed, seed_mapping);

        let mut to_be_checked = VecDeque::from([seed]);
        while let Some(current) = to_be_checked.pop_front() {
            let current_mapping = mapping
                .get(current)
                .cloned()
                .ok_or(IntegrationError::MissingPreviousMapping(current))?;

            for face in 0..number_of_faces {
                for neighbour in region.mesh.adjacent_elements(current, face)? {
                    if mapping.contains(neighbour) {
                        continue;
                    }

                    let neighbour_mapping = map_neighbour(neighbour, face, &current_mapping)?;
                    trace!(
                        "Element {} reached from Element {} across face {}: offset {:?}, differentials {:?}",
                        neighbour,
                        current,
                        face,
                        neighbour_mapping.offset.as_slice(),
                        neighbour_mapping.differentials.as_slice()
                    );
                    mapping.insert(neighbour, neighbour_mapping);
                    to_be_checked.push_back(neighbour);
                }
            }
        }

        Ok(mapping)
    }

    /// A JSON description of every Element's frame, in the order they were reached
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        let elements: Vec<JsonValue> = self
            .iter()
            .map(|(element, mapping)| {
                object! {
                    "element": element,
                    "offset": mapping.offset.to_vec(),
                    "differentials": mapping.differentials.to_vec(),
                }
            })
            .collect();

        object! {
            "elements": JsonValue::from(elements),
        }
    }
}

/// One upwind update of a 1D frame.
///
/// `previous` is the Element's frame before the step and `from` the new frame of the Element
/// it is reached from. Across face 0 (entry) the offset moves back by `flow_step / length`
/// of the previous differential and the differential closes the gap to `from`. Across face 1
/// (exit) the offset starts where `from` ends and the differential is what remains of the
/// previous extent. A zero `length` leaves the offset at `from` and the exit differential at 0.
pub fn upwind_step(
    previous: &ElementMapping,
    from: &ElementMapping,
    face: usize,
    flow_step: f64,
    length: f64,
) -> ElementMapping {
    let (offset, differential) = if face == 0 {
        let offset = if length != 0.0 {
            previous.offset[0] - (flow_step / length) * previous.differentials[0]
        } else {
            from.offset[0]
        };
        (offset, from.offset[0] - offset)
    } else {
        let offset = from.offset[0] + from.differentials[0];
        let differential = if length != 0.0 {
            previous.offset[0] + previous.differentials[0]
                - (flow_step / length) * previous.differentials[0]
                - offset
        } else {
            0.0
        };
        (offset, differential)
    };

    ElementMapping {
        offset: smallvec![offset],
        differentials: smallvec![differential],
    }
}

fn check_inputs(
    region: &Region,
    seed: ElementId,
    integrand: FieldId,
    coordinate: FieldId,
) -> Result<usize, IntegrationError> {
    let seed_element = region
        .mesh
        .element(seed)
        .map_err(|_| IntegrationError::SeedNotFound(seed))?;
    if !seed_element.is_top_level() {
        return Err(IntegrationError::SeedNotTopLevel(seed));
    }

    let integrand_components = region.field(integrand)?.number_of_components();
    if integrand_components != 1 {
        return Err(IntegrationError::IntegrandNotScalar(integrand_components));
    }

    let coordinate_components = region.field(coordinate)?.number_of_components();
    if coordinate_components == 0 || coordinate_components > MAX_COORDINATE_COMPONENTS {
        return Err(IntegrationError::InvalidCoordinateComponents(coordinate_components));
    }

    Ok(seed_element.dimension())
}

fn finish(
    operation: &str,
    seed: ElementId,
    result: Result<IntegrationMapping, IntegrationError>,
    sampler: &mut EdgeSampler,
) -> Result<IntegrationMapping, IntegrationError> {
    sampler.clear();
    match &result {
        Ok(mapping) => debug!(
            "Integration {} from Element {} mapped {} Elements",
            operation,
            seed,
            mapping.len()
        ),
        Err(err) => warn!(
            "Integration {} from Element {} aborted: {}",
            operation, seed, err
        ),
    }
    result
}

/// Samples the integrand and coordinate Fields along lines through the centre of an Element
struct EdgeSampler<'r> {
    region: &'r Region,
    integrand: FieldId,
    coordinate: FieldId,
    rule: QuadratureRule,
    cache: FieldCache,
}

impl<'r> EdgeSampler<'r> {
    fn new(region: &'r Region, integrand: FieldId, coordinate: FieldId, rule: QuadratureRule) -> Self {
        Self {
            region,
            integrand,
            coordinate,
            rule,
            cache: FieldCache::new(),
        }
    }

    fn clear(&mut self) {
        self.cache.clear();
    }

    /// `(integrand, |dX/dxi_axis|)` at `position` along `axis`, with other xi held at 0.5.
    /// A single component coordinate gives a signed derivative.
    fn sample(&mut self, element: ElementId, dimension: usize, axis: usize, position: f64) -> Result<(f64, f64), EvaluationError> {
        let mut xi: Xi = smallvec![0.5; dimension];
        xi[axis] = position;
        self.cache.set_element_xi(element, &xi);

        let integrand = self
            .region
            .evaluate(self.integrand, &mut self.cache, false)?
            .values
            .first()
            .copied()
            .ok_or(EvaluationError::NotComputed("integrand".to_string()))?;

        let coordinate = self.region.evaluate(self.coordinate, &mut self.cache, true)?;
        let derivatives = coordinate
            .derivatives
            .as_ref()
            .ok_or(EvaluationError::NotComputed("coordinate derivatives".to_string()))?;
        let column = derivatives.column(axis);
        let arc = if column.len() == 1 {
            column[0]
        } else {
            column.norm()
        };

        Ok((integrand, arc))
    }

    fn differentials(&mut self, element: ElementId, dimension: usize) -> Result<Xi, EvaluationError> {
        let mut differentials: Xi = smallvec![0.0; dimension];
        for (axis, differential) in differentials.iter_mut().enumerate() {
            for (position, weight) in self.rule.points() {
                let (integrand, arc) = self.sample(element, dimension, axis, *position)?;
                *differential += integrand * arc * weight;
            }
        }
        Ok(differentials)
    }

    /// `(time_step × ∫ integrand, ∫ |dX/dxi|)` along a 1D Element
    fn flow_and_length(&mut self, element: ElementId, time_step: f64) -> Result<(f64, f64), EvaluationError> {
        let mut flow_step = 0.0;
        let mut length = 0.0;
        for (position, weight) in self.rule.points() {
            let (integrand, arc) = self.sample(element, 1, 0, *position)?;
            flow_step += time_step * integrand * weight;
            length += arc * weight;
        }
        Ok((flow_step, length))
    }
}
