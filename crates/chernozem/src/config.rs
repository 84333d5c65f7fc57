use serde::{Deserialize, Serialize};

/// Behavioral switches for a [`Container`](crate::Container).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// When `true`, reading an absent key yields `Value::Null` instead of
    /// failing with `KeyNotFound`.
    pub nullable: bool,
    /// When `true`, plain maps written to the container are promoted to
    /// nested containers (recursively) before being stored.
    pub promote_nested: bool,
}

impl ContainerConfig {
    /// A configuration whose reads of absent keys yield `Null`.
    pub fn nullable() -> Self {
        Self {
            nullable: true,
            ..Default::default()
        }
    }

    /// A configuration promoting nested maps to nested containers.
    pub fn nested() -> Self {
        Self {
            promote_nested: true,
            ..Default::default()
        }
    }
}
