//! Post-OCR medical term correction.
//!
//! Undoes glyph-level OCR misreads (`rn` → `m`, `u` → `n`, `0` → `o`) in
//! medication and condition names. A word is rewritten only when it folds to
//! the same OCR-confusion key as exactly one vocabulary term and is not a
//! known term itself. Real drugs that merely look alike (`Esomeprazole`,
//! `Omeprazole`) never share a key, so they pass through untouched.

use std::collections::HashMap;

/// Drug names that show up on prescriptions regardless of the loaded
/// knowledge base. Sorted, lowercase.
const BASE_TERMS: &[&str] = &[
    "allopurinol", "amlodipine", "amoxicillin", "atenolol", "atorvastatin",
    "azithromycin", "bisoprolol", "budesonide", "carvedilol", "cetirizine",
    "ciprofloxacin", "clopidogrel", "diclofenac", "domperidone", "empagliflozin",
    "enalapril", "escitalopram", "fluticasone", "furosemide", "gabapentin",
    "gliclazide", "glimepiride", "hydrochlorothiazide", "ibuprofen", "insulin",
    "levothyroxine", "lisinopril", "losartan", "metformin", "methotrexate",
    "metoprolol", "montelukast", "omeprazole", "ondansetron", "pantoprazole",
    "paracetamol", "prednisolone", "prednisone", "ramipril", "rosuvastatin",
    "salbutamol", "sertraline", "simvastatin", "sitagliptin", "spironolactone",
    "telmisartan", "tiotropium", "vildagliptin", "warfarin",
];

/// Everyday prescription words that sit close to vocabulary terms
/// (`after` ~ `artery`). Never corrected. Sorted, lowercase.
const COMMON_WORDS: &[&str] = &[
    "after", "apply", "before", "daily", "every", "hours", "lunch", "meals", "month",
    "months", "night", "other", "times", "under", "water", "weeks",
];

const MIN_WORD_LEN: usize = 5;

/// Vocabulary-backed corrector. Build once, reuse across documents.
#[derive(Debug, Clone)]
pub struct MedicalTermCorrector {
    /// Sorted, deduplicated, lowercase.
    terms: Vec<String>,
    /// Confusion key → term; `None` when two terms share the key.
    by_key: HashMap<String, Option<String>>,
}

impl Default for MedicalTermCorrector {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl MedicalTermCorrector {
    /// Base drug list plus every single word (≥ 5 letters) of `vocabulary`.
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut terms: Vec<String> = BASE_TERMS.iter().map(|t| t.to_string()).collect();
        for entry in vocabulary {
            for word in entry.as_ref().split(|c: char| !c.is_alphabetic()) {
                if word.chars().count() >= MIN_WORD_LEN {
                    terms.push(word.to_lowercase());
                }
            }
        }
        terms.sort();
        terms.dedup();

        let mut by_key: HashMap<String, Option<String>> = HashMap::with_capacity(terms.len());
        for term in &terms {
            by_key
                .entry(confusion_key(term))
                .and_modify(|slot| *slot = None)
                .or_insert_with(|| Some(term.clone()));
        }

        Self { terms, by_key }
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Correct every word of `text`, leaving separators untouched.
    pub fn correct(&self, text: &str) -> String {
        let mut result = String::with_capacity(text.len());
        let mut word_buf = String::new();

        for ch in text.chars() {
            if ch.is_alphanumeric() {
                word_buf.push(ch);
            } else {
                if !word_buf.is_empty() {
                    result.push_str(&self.correct_word(&word_buf));
                    word_buf.clear();
                }
                result.push(ch);
            }
        }

        if !word_buf.is_empty() {
            result.push_str(&self.correct_word(&word_buf));
        }

        result
    }

    fn correct_word(&self, word: &str) -> String {
        let starts_alphabetic = word.chars().next().is_some_and(char::is_alphabetic);
        if word.chars().count() < MIN_WORD_LEN || !starts_alphabetic {
            return word.to_string();
        }

        let lower = word.to_lowercase();
        if self.terms.binary_search(&lower).is_ok() || COMMON_WORDS.binary_search(&lower.as_str()).is_ok() {
            return word.to_string();
        }

        match self.by_key.get(&confusion_key(&lower)) {
            Some(Some(term)) => {
                tracing::debug!(from = word, to = term.as_str(), "Corrected OCR term");
                preserve_case(word, term)
            }
            _ => word.to_string(),
        }
    }
}

/// Fold the glyph pairs OCR engines confuse onto one canonical spelling.
fn confusion_key(word: &str) -> String {
    let chars: Vec<char> = word.to_lowercase().chars().collect();
    let mut key = String::with_capacity(chars.len());
    let mut i = 0;

    while i < chars.len() {
        match (chars[i], chars.get(i + 1)) {
            ('r', Some('n')) => {
                key.push('m');
                i += 2;
            }
            ('c', Some('l')) => {
                key.push('d');
                i += 2;
            }
            ('v', Some('v')) => {
                key.push('w');
                i += 2;
            }
            (c, _) => {
                key.push(match c {
                    'u' => 'n',
                    '0' => 'o',
                    '1' => 'l',
                    '5' => 's',
                    other => other,
                });
                i += 1;
            }
        }
    }

    key
}

/// Carry the original capitalization pattern over to the correction.
fn preserve_case(original: &str, correction: &str) -> String {
    if original.chars().all(|c| c.is_uppercase() || !c.is_alphabetic()) {
        return correction.to_uppercase();
    }

    let first_upper = original.chars().next().is_some_and(|c| c.is_uppercase());
    if first_upper {
        let mut chars = correction.chars();
        match chars.next() {
            Some(c) => {
                let mut s = c.to_uppercase().to_string();
                s.extend(chars);
                s
            }
            None => correction.to_string(),
        }
    } else {
        correction.to_string()
    }
}
