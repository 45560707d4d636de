use super::{ElementXi, FieldId, FieldValues};
use crate::mesh::ElementId;

use log::trace;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// The evaluation context of a single caller: a location, and the values of every Field
/// evaluated there so far.
///
/// Moving to a new location discards the stored values. A cache is not shared between
/// threads; parallel callers each use their own.
#[derive(Clone, Debug, Default)]
pub struct FieldCache {
    location: Option<ElementXi>,
    values: HashMap<FieldId, FieldValues>,
    last_found: HashMap<FieldId, ElementId>,
}

impl FieldCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_element_xi(&mut self, element: ElementId, xi: &[f64]) {
        let unchanged = self
            .location
            .as_ref()
            .map_or(false, |loc| loc.element == element && loc.xi.as_slice() == xi);

        if !unchanged {
            if !self.values.is_empty() {
                trace!("Location changed to Element {}; discarding {} cached values", element, self.values.len());
            }
            self.values.clear();
            self.location = Some(ElementXi::new(element, xi));
        }
    }

    pub fn location(&self) -> Option<&ElementXi> {
        self.location.as_ref()
    }

    /// Whether values (and derivatives, if requested) of `field` are stored for the current location
    pub fn has_values(&self, field: FieldId, derivatives: bool) -> bool {
        self.values
            .get(&field)
            .map_or(false, |v| !derivatives || v.derivatives.is_some())
    }

    pub fn values(&self, field: FieldId) -> Option<&FieldValues> {
        self.values.get(&field)
    }

    pub(crate) fn store(&mut self, field: FieldId, values: FieldValues) -> &FieldValues {
        match self.values.entry(field) {
            Entry::Occupied(mut entry) => {
                entry.insert(values);
                entry.into_mut()
            }
            Entry::Vacant(entry) => entry.insert(values),
        }
    }

    /// Discard the location and every stored value
    pub fn clear(&mut self) {
        self.location = None;
        self.values.clear();
        self.last_found.clear();
    }

    pub(crate) fn last_found_element(&self, field: FieldId) -> Option<ElementId> {
        self.last_found.get(&field).copied()
    }

    pub(crate) fn set_last_found_element(&mut self, field: FieldId, element: ElementId) {
        self.last_found.insert(field, element);
    }
}
