//! Layer identity and per-layer offering declarations.

use std::collections::BTreeSet;
use std::fmt;

/// Stable numeric identity of a publisher, assigned by the broker in
/// first-seen order starting at 1. Never reused or reassigned.
pub type PublisherId = i32;

/// Identifier for a category of map data.
///
/// Equality and ordering consider all three fields; two layers are the same
/// subscription/offering key only when type, subtype, and version all match.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Layer {
    pub layer_type: i32,
    pub subtype: i32,
    pub version: i32,
}

impl Layer {
    pub fn new(layer_type: i32, subtype: i32, version: i32) -> Self {
        Self {
            layer_type,
            subtype,
            version,
        }
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Layer({}/{}/{})",
            self.layer_type, self.subtype, self.version
        )
    }
}

/// One offered layer together with its dependency alternatives.
///
/// The layer is available from the offering publisher when any single
/// alternative has all of its member layers available (OR of ANDs). An empty
/// alternative set means the layer has no prerequisites, as does an empty
/// alternatives list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LayerOffering {
    pub layer: Layer,
    pub alternatives: Vec<BTreeSet<Layer>>,
}

impl LayerOffering {
    /// An offering entry with no dependencies; satisfied unconditionally.
    pub fn unconditional(layer: Layer) -> Self {
        Self {
            layer,
            alternatives: Vec::new(),
        }
    }

    /// An offering entry satisfied when every layer in `dependencies` is
    /// available.
    pub fn with_dependencies(layer: Layer, dependencies: BTreeSet<Layer>) -> Self {
        Self {
            layer,
            alternatives: vec![dependencies],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Layer, LayerOffering};
    use std::collections::BTreeSet;

    #[test]
    fn layer_equality_considers_all_fields() {
        let layer = Layer::new(1, 2, 3);
        assert_eq!(layer, Layer::new(1, 2, 3));
        assert_ne!(layer, Layer::new(1, 2, 4));
        assert_ne!(layer, Layer::new(1, 3, 3));
        assert_ne!(layer, Layer::new(2, 2, 3));
    }

    #[test]
    fn unconditional_offering_has_no_alternatives() {
        let offering = LayerOffering::unconditional(Layer::new(1, 0, 1));
        assert!(offering.alternatives.is_empty());
    }

    #[test]
    fn dependent_offering_carries_one_alternative() {
        let deps: BTreeSet<_> = [Layer::new(2, 0, 1), Layer::new(3, 0, 1)].into();
        let offering = LayerOffering::with_dependencies(Layer::new(1, 0, 1), deps.clone());
        assert_eq!(offering.alternatives, vec![deps]);
    }
}
