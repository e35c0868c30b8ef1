//! The combined operator bundle: all five families together.
//!
//! The persisted job state carries either a complete [`SerializedBundle`] or
//! none at all; families are never persisted piecemeal.

use serde::{Deserialize, Serialize};

use crate::crossover::CrossoverSettings;
use crate::entry::{Decoded, MethodEntry, SingleMethodForm};
use crate::mutation::MutationSettings;
use crate::replacement::ReplacementSettings;
use crate::selection::SelectionSettings;
use crate::stop::StopCriteriaSettings;

/// Typed settings for all five operator families.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperatorBundle {
    pub selection: SelectionSettings,
    pub replacement: ReplacementSettings,
    pub mutation: MutationSettings,
    pub crossover: CrossoverSettings,
    pub stop_criteria: StopCriteriaSettings,
}

impl OperatorBundle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serialize(&self) -> SerializedBundle {
        SerializedBundle {
            selection: self.selection.serialize(),
            replacement: self.replacement.serialize(),
            mutation: self.mutation.serialize(),
            crossover: self.crossover.serialize(),
            stop_criteria: self.stop_criteria.serialize(),
        }
    }

    /// Rebuild every family from its encoded form. The skip count aggregates
    /// across all five families.
    pub fn from_serialized(encoded: &SerializedBundle) -> Decoded<Self> {
        let selection = SelectionSettings::from_serialized(&encoded.selection);
        let replacement = ReplacementSettings::from_serialized(&encoded.replacement);
        let mutation = MutationSettings::from_serialized(&encoded.mutation);
        let crossover = CrossoverSettings::from_serialized(&encoded.crossover);
        let stop_criteria = StopCriteriaSettings::from_serialized(&encoded.stop_criteria);

        Decoded {
            skipped: selection.skipped
                + replacement.skipped
                + mutation.skipped
                + crossover.skipped
                + stop_criteria.skipped,
            value: Self {
                selection: selection.value,
                replacement: replacement.value,
                mutation: mutation.value,
                crossover: crossover.value,
                stop_criteria: stop_criteria.value,
            },
        }
    }
}

/// Durable form of the full bundle, one block per family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedBundle {
    pub selection: SingleMethodForm,
    pub replacement: SingleMethodForm,
    pub mutation: Vec<MethodEntry>,
    pub crossover: Vec<MethodEntry>,
    pub stop_criteria: Vec<MethodEntry>,
}

impl SerializedBundle {
    /// The encoding of a freshly constructed, still-empty bundle.
    pub fn empty() -> Self {
        OperatorBundle::new().serialize()
    }
}
