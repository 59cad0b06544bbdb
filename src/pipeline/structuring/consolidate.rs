use std::collections::HashMap;

use crate::models::ParsedMedicationEntry;

/// Collapse duplicate medications by lowercase name.
///
/// The first occurrence keeps its position and its values; a later duplicate
/// only fills fields the first left empty.
pub fn consolidate_medications(entries: Vec<ParsedMedicationEntry>) -> Vec<ParsedMedicationEntry> {
    let mut out: Vec<ParsedMedicationEntry> = Vec::with_capacity(entries.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for entry in entries {
        let key = entry.normalized_name();
        match index.get(&key) {
            Some(&pos) => merge_into(&mut out[pos], entry),
            None => {
                index.insert(key, out.len());
                out.push(entry);
            }
        }
    }

    out
}

fn merge_into(canonical: &mut ParsedMedicationEntry, duplicate: ParsedMedicationEntry) {
    if canonical.strength.is_empty() {
        canonical.strength = duplicate.strength;
    }
    if canonical.frequency.is_empty() {
        canonical.frequency = duplicate.frequency;
    }
    let has_instructions = canonical
        .instructions
        .as_deref()
        .is_some_and(|i| !i.trim().is_empty());
    if !has_instructions {
        canonical.instructions = duplicate.instructions;
    }
}
