use super::{EvaluationError, FieldCache, FieldId, Region};
use crate::mesh::ElementId;
use crate::Xi;

use rayon::prelude::*;

/// Values of a Field over a uniform lattice of xi locations in one Element
#[derive(Clone, Debug, PartialEq)]
pub struct ElementSamples {
    pub element: ElementId,
    pub xi: Vec<Xi>,
    /// One entry per xi location, each holding every component
    pub values: Vec<Vec<f64>>,
}

/// Samples Fields at `density` evenly spaced locations along each xi direction of every
/// top-level Element (the arrays consumed by a renderer).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UniformSampler {
    density: usize,
}

impl UniformSampler {
    pub fn new(density: usize) -> Self {
        Self { density }
    }

    pub fn density(&self) -> usize {
        self.density
    }

    /// The sample locations within an Element of the given dimension (xi1 varying fastest)
    pub fn lattice(&self, dimension: usize) -> Vec<Xi> {
        let range = uniform_range(0.0, 1.0, self.density);
        let count = range.len().pow(dimension as u32);

        (0..count)
            .map(|mut index| {
                (0..dimension)
                    .map(|_| {
                        let x = range[index % range.len()];
                        index /= range.len();
                        x
                    })
                    .collect()
            })
            .collect()
    }

    /// Evaluate a Field over every top-level Element in parallel, one cache per Element.
    /// Fails if the Field cannot be evaluated at any sample location.
    pub fn sample(&self, region: &Region, field: FieldId) -> Result<Vec<ElementSamples>, EvaluationError> {
        region.field(field)?;

        let elements: Vec<(ElementId, usize)> = region
            .mesh
            .top_level_elements()
            .map(|element| (element.id, element.dimension()))
            .collect();

        elements
            .par_iter()
            .map(|(element, dimension)| {
                let mut cache = FieldCache::new();
                let xi = self.lattice(*dimension);
                let values = xi
                    .iter()
                    .map(|location| {
                        cache.set_element_xi(*element, location);
                        region
                            .evaluate(field, &mut cache, false)
                            .map(|result| result.values.clone())
                    })
                    .collect::<Result<Vec<Vec<f64>>, EvaluationError>>()?;

                Ok(ElementSamples {
                    element: *element,
                    xi,
                    values,
                })
            })
            .collect()
    }
}

fn uniform_range(min: f64, max: f64, n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![(min + max) / 2.0];
    }
    let step = (max - min) / ((n - 1) as f64);
    (0..n).map(|i| (i as f64) * step + min).collect()
}
