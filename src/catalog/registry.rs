//! Dimension catalog
//!
//! Resolves the configured `expansions` into typed dimensions with lookups
//! used by the rule builders.

use crate::catalog::dimension::Dimension;
use crate::types::{DimensionKind, Expansions, FloorRef};
use serde::{Deserialize, Serialize};

/// All dimensions available to template expansion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionCatalog {
    buildings: Dimension,
    floors: Dimension,
    rooms: Dimension,
    devices: Dimension,
}

impl DimensionCatalog {
    /// Build the catalog from configured expansions
    pub fn from_expansions(expansions: &Expansions) -> Self {
        let buildings = expansions.buildings.as_deref().unwrap_or(&[]);
        Self {
            buildings: Dimension::from_labels(DimensionKind::Building, buildings),
            floors: Dimension::from_labels(DimensionKind::Floor, &expansions.floors),
            rooms: Dimension::from_labels(DimensionKind::Room, &expansions.rooms),
            devices: Dimension::from_labels(DimensionKind::Device, &expansions.devices),
        }
    }

    /// Get a dimension by kind
    pub fn dimension(&self, kind: DimensionKind) -> &Dimension {
        match kind {
            DimensionKind::Building => &self.buildings,
            DimensionKind::Floor => &self.floors,
            DimensionKind::Room => &self.rooms,
            DimensionKind::Device => &self.devices,
        }
    }

    /// Resolve an explicit floor reference to the label used in topics
    ///
    /// A number resolves to the catalog floor carrying that number; when no
    /// such floor exists the number itself is used.
    pub fn floor_label(&self, floor: &FloorRef) -> String {
        match floor {
            FloorRef::Label(label) => label.clone(),
            FloorRef::Number(number) => self
                .floors
                .find_by_number(*number)
                .map(|value| value.label.clone())
                .unwrap_or_else(|| number.to_string()),
        }
    }

    /// Total number of values across all dimensions
    pub fn total_values(&self) -> usize {
        DimensionKind::ALL.iter().map(|kind| self.dimension(*kind).len()).sum()
    }
}
