use serde::{Deserialize, Serialize};

/// One medication line recovered from a prescription.
///
/// `confirmed` is always false when produced here; only a human reviewer
/// downstream flips it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ParsedMedicationEntry {
    pub name: String,
    /// Raw strength token, e.g. `500mg`. Empty when not found.
    pub strength: String,
    /// Raw frequency code or dose pattern, e.g. `BD` or `1-0-1`.
    pub frequency: String,
    pub instructions: Option<String>,
    pub confirmed: bool,
}

impl ParsedMedicationEntry {
    /// True when at least one of strength, frequency or instructions is set.
    pub fn has_details(&self) -> bool {
        !self.strength.is_empty()
            || !self.frequency.is_empty()
            || self
                .instructions
                .as_deref()
                .is_some_and(|i| !i.trim().is_empty())
    }

    /// Emission invariant: a name with a letter in it, plus some detail.
    pub fn is_valid(&self) -> bool {
        self.name.chars().any(char::is_alphabetic) && self.has_details()
    }

    /// Consolidation key.
    pub fn normalized_name(&self) -> String {
        self.name.to_lowercase()
    }
}
