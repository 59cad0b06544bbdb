//! Heuristic medication line parser.
//!
//! Works line by line over conditioned text. A line that carries a detail
//! token (strength, frequency, duration) is a candidate; the medication name
//! is the leading word group left after the tokens are cut out. Names and
//! details split across two adjacent lines are stitched back together.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

use super::tokens::{scan_line, LineTokens};
use crate::models::ParsedMedicationEntry;

/// Header and footer labels that never start a medication line.
static HEADER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:dr|doctor|patient|name|age|sex|gender|date|signature|sign|reg|regn|registration|address|phone|tel|mobile|email|e-mail|hospital|clinic|diagnosis)\b",
    )
    .unwrap()
});

/// Leading list markers: `1.`, `2)`, `-`, `*`, `•`, `Rx`, `Rx:`
static LIST_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:\d{1,2}[.)]|[-*•]|rx:?|r/)$").unwrap()
});

const DOSAGE_FORMS: &[&str] = &[
    "tab", "tabs", "tablet", "tablets", "cap", "caps", "capsule", "capsules", "inj",
    "injection", "syp", "syr", "syrup", "susp", "suspension", "oint", "ointment",
];

/// Single-letter form abbreviations (`T.`, `C.`); only count with the period.
const ABBREVIATED_FORMS: &[&str] = &["t.", "c."];

/// Words that begin the instruction part of a line.
const INSTRUCTION_WORDS: &[&str] = &[
    "after", "and", "as", "at", "before", "bedtime", "by", "daily", "empty", "evening",
    "every", "food", "for", "if", "in", "meal", "meals", "morning", "night", "noon", "on",
    "hourly", "needed", "once", "or", "orally", "per", "required", "stomach", "take", "then",
    "thrice", "to", "twice", "weekly", "when", "with", "without", "x",
];

const MAX_NAME_WORDS: usize = 4;

/// Raw parser output, before consolidation.
#[derive(Debug, Clone, Default)]
pub struct ParseOutcome {
    pub entries: Vec<ParsedMedicationEntry>,
    /// Lines carrying at least one detail token.
    pub candidate_lines: usize,
    /// Candidate lines that contributed to an emitted entry.
    pub yielded_lines: usize,
}

impl ParseOutcome {
    /// Share of candidate lines that produced an entry; 1.0 with no candidates.
    pub fn parsing_ratio(&self) -> f32 {
        if self.candidate_lines == 0 {
            1.0
        } else {
            (self.yielded_lines as f32 / self.candidate_lines as f32).clamp(0.0, 1.0)
        }
    }
}

struct Line<'a> {
    text: &'a str,
    tokens: LineTokens,
    name: NameSplit,
}

impl Line<'_> {
    fn has_tokens(&self) -> bool {
        !self.tokens.is_empty()
    }

    /// A token line without a usable name of its own.
    fn is_detail_only(&self) -> bool {
        self.has_tokens() && !self.name.is_valid()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct NameSplit {
    name: String,
    leftover: Option<String>,
}

impl NameSplit {
    fn is_valid(&self) -> bool {
        is_valid_name(&self.name)
    }
}

/// Parse every medication entry out of `text`.
pub fn parse_medications(text: &str) -> ParseOutcome {
    let lines: Vec<Line<'_>> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !is_header_line(l))
        .map(|text| {
            let tokens = scan_line(text);
            let name = split_leading_name(&strip_spans(text, &tokens));
            Line { text, tokens, name }
        })
        .collect();

    let mut outcome = ParseOutcome {
        candidate_lines: lines.iter().filter(|l| l.has_tokens()).count(),
        ..ParseOutcome::default()
    };
    let mut yielded: BTreeSet<usize> = BTreeSet::new();
    let mut consumed = vec![false; lines.len()];

    for i in 0..lines.len() {
        if consumed[i] {
            continue;
        }
        consumed[i] = true;
        let line = &lines[i];
        let next = (i + 1 < lines.len() && !consumed[i + 1]).then(|| (i + 1, &lines[i + 1]));

        let mut draft = if line.has_tokens() {
            match draft_from_token_line(line, next) {
                Some((draft, used_next)) => {
                    yielded.insert(i);
                    if let Some(j) = used_next {
                        consumed[j] = true;
                        if lines[j].has_tokens() {
                            yielded.insert(j);
                        }
                    }
                    draft
                }
                None => continue,
            }
        } else {
            // A bare name line only emits when the next line carries its details.
            match next {
                Some((j, detail)) if line.name.is_valid() && detail.is_detail_only() => {
                    consumed[j] = true;
                    yielded.insert(j);
                    let mut draft = Draft::named(&line.name);
                    draft.absorb_details(detail);
                    draft
                }
                _ => continue,
            }
        };

        // Back-fill from a following detail-only line.
        if let Some(j) = (i + 1..lines.len()).find(|&j| !consumed[j]) {
            let detail = &lines[j];
            if detail.is_detail_only() && draft.would_gain_from(&detail.tokens) {
                consumed[j] = true;
                yielded.insert(j);
                draft.absorb_details(detail);
            }
        }

        let entry = draft.finish();
        if entry.is_valid() {
            outcome.entries.push(entry);
        } else {
            tracing::debug!(line = line.text, "Dropped line without a usable medication entry");
        }
    }

    outcome.yielded_lines = yielded.len();
    outcome
}

/// Build an entry for a line that has detail tokens. Returns the index of
/// a neighbouring line it consumed, if any.
fn draft_from_token_line(line: &Line<'_>, next: Option<(usize, &Line<'_>)>) -> Option<(Draft, Option<usize>)> {
    if line.name.is_valid() {
        let mut draft = Draft::named(&line.name);
        draft.set_tokens(&line.tokens);
        return Some((draft, None));
    }

    // Name on the following line.
    if let Some((j, candidate)) = next {
        if !candidate.has_tokens() && candidate.name.is_valid() {
            let mut draft = Draft::named(&candidate.name);
            draft.set_tokens(&line.tokens);
            if let Some(left) = &line.name.leftover {
                draft.instructions.insert(0, left.clone());
            }
            return Some((draft, Some(j)));
        }
    }

    // Verbatim fallback: the line up to its first column gap.
    let has_free_letter = strip_spans(line.text, &line.tokens).chars().any(char::is_alphabetic);
    if !has_free_letter {
        return None;
    }
    let head = line.text.split("  ").next().unwrap_or(line.text);
    let name = sanitize_name(head);
    if !is_valid_name(&name) {
        return None;
    }

    let mut draft = Draft {
        name,
        ..Draft::default()
    };
    draft.strength = line.tokens.strength_value();
    draft.frequency = line.tokens.frequency_value();
    draft.duration = line.tokens.duration_value();
    Some((draft, None))
}

#[derive(Debug, Default)]
struct Draft {
    name: String,
    strength: String,
    frequency: String,
    instructions: Vec<String>,
    duration: Option<String>,
}

impl Draft {
    fn named(split: &NameSplit) -> Self {
        Self {
            name: split.name.clone(),
            instructions: split.leftover.iter().cloned().collect(),
            ..Self::default()
        }
    }

    fn set_tokens(&mut self, tokens: &LineTokens) {
        self.strength = tokens.strength_value();
        self.frequency = tokens.frequency_value();
        self.duration = tokens.duration_value();
    }

    fn would_gain_from(&self, tokens: &LineTokens) -> bool {
        (self.strength.is_empty() && tokens.strength.is_some())
            || (self.frequency.is_empty() && tokens.frequency.is_some())
            || (self.duration.is_none() && tokens.duration.is_some())
    }

    /// Fill whatever is still missing from a detail line.
    fn absorb_details(&mut self, line: &Line<'_>) {
        if self.strength.is_empty() {
            self.strength = line.tokens.strength_value();
        }
        if self.frequency.is_empty() {
            self.frequency = line.tokens.frequency_value();
        }
        if self.duration.is_none() {
            self.duration = line.tokens.duration_value();
        }
        if let Some(left) = &line.name.leftover {
            if left.chars().any(char::is_alphabetic) {
                self.instructions.push(left.clone());
            }
        }
    }

    fn finish(self) -> ParsedMedicationEntry {
        let parts: Vec<String> = self
            .instructions
            .into_iter()
            .chain(self.duration)
            .filter(|p| !p.trim().is_empty())
            .collect();

        ParsedMedicationEntry {
            name: self.name,
            strength: self.strength,
            frequency: self.frequency,
            instructions: (!parts.is_empty()).then(|| parts.join(", ")),
            confirmed: false,
        }
    }
}

fn is_header_line(line: &str) -> bool {
    HEADER_LINE.is_match(line)
}

/// Blank out token spans, keeping byte offsets stable.
fn strip_spans(line: &str, tokens: &LineTokens) -> String {
    let spans: Vec<_> = tokens.spans().cloned().collect();
    line.char_indices()
        .map(|(i, c)| if spans.iter().any(|s| s.contains(&i)) { ' ' } else { c })
        .collect()
}

/// Leading word group of a token-free remainder, plus what follows it.
fn split_leading_name(remainder: &str) -> NameSplit {
    let words: Vec<&str> = remainder.split_whitespace().collect();
    let mut idx = 0;

    while idx < words.len() && is_prefix_word(words[idx]) {
        idx += 1;
    }

    let mut name_words: Vec<&str> = Vec::new();
    while idx < words.len() && name_words.len() < MAX_NAME_WORDS {
        let word = words[idx];
        if !word.chars().next().is_some_and(char::is_alphabetic) {
            break;
        }
        let bare = sanitize_name(word).to_lowercase();
        if INSTRUCTION_WORDS.contains(&bare.as_str()) {
            break;
        }
        idx += 1;
        if word.ends_with([',', ';', ':']) {
            name_words.push(word.trim_end_matches([',', ';', ':']));
            break;
        }
        name_words.push(word);
    }

    let leftover = sanitize_name(&words[idx..].join(" "));
    NameSplit {
        name: sanitize_name(&name_words.join(" ")),
        leftover: (!leftover.is_empty()).then_some(leftover),
    }
}

fn is_prefix_word(word: &str) -> bool {
    if LIST_MARKER.is_match(word) {
        return true;
    }
    let lower = word.to_lowercase();
    if ABBREVIATED_FORMS.contains(&lower.as_str()) {
        return true;
    }
    let bare = lower.trim_end_matches('.');
    DOSAGE_FORMS.contains(&bare)
}

/// Trim leading and trailing punctuation.
fn sanitize_name(raw: &str) -> String {
    raw.trim_matches(|c: char| !c.is_alphanumeric()).to_string()
}

fn is_valid_name(name: &str) -> bool {
    name.chars().count() > 2 && name.chars().any(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Vec<ParsedMedicationEntry> {
        parse_medications(text).entries
    }

    #[test]
    fn two_simple_lines() {
        let out = parse_medications("Metformin 500mg BD\nAmlodipine 5mg OD");
        assert_eq!(out.entries.len(), 2);
        assert_eq!(out.entries[0].name, "Metformin");
        assert_eq!(out.entries[0].strength, "500mg");
        assert_eq!(out.entries[0].frequency, "BD");
        assert_eq!(out.entries[0].instructions, None);
        assert_eq!(out.entries[1].name, "Amlodipine");
        assert_eq!(out.entries[1].frequency, "OD");
        assert_eq!(out.candidate_lines, 2);
        assert_eq!(out.yielded_lines, 2);
        assert!(out.entries.iter().all(|e| !e.confirmed));
    }

    #[test]
    fn dosage_form_and_list_markers_skipped() {
        let entries = parse("1. Tab. Metformin 500mg BD after meals\n2) Cap Omeprazole 20mg OD before breakfast");
        assert_eq!(entries[0].name, "Metformin");
        assert_eq!(entries[0].instructions.as_deref(), Some("after meals"));
        assert_eq!(entries[1].name, "Omeprazole");
        assert_eq!(entries[1].instructions.as_deref(), Some("before breakfast"));
    }

    #[test]
    fn multi_word_names_up_to_four_words() {
        let entries = parse("Insulin Glargine 10 IU HS");
        assert_eq!(entries[0].name, "Insulin Glargine");
        assert_eq!(entries[0].strength, "10 IU");
        assert_eq!(entries[0].frequency, "HS");
    }

    #[test]
    fn dose_pattern_and_duration() {
        let entries = parse("Glimepiride 2 mg 1-0-0 before breakfast x 30 days");
        assert_eq!(entries[0].name, "Glimepiride");
        assert_eq!(entries[0].strength, "2 mg");
        assert_eq!(entries[0].frequency, "1-0-0");
        assert_eq!(entries[0].instructions.as_deref(), Some("before breakfast, 30 days"));
    }

    #[test]
    fn attached_duration_stays_out_of_name() {
        let entries = parse("Metformin SR 500 mg BD x5days");
        assert_eq!(entries[0].name, "Metformin SR");
        assert_eq!(entries[0].strength, "500 mg");
        assert_eq!(entries[0].frequency, "BD");
        assert_eq!(entries[0].instructions.as_deref(), Some("5 days"));
    }

    #[test]
    fn single_letter_forms_need_period() {
        let entries = parse("T. Paracetamol 650mg SOS\nC. Omeprazole 20mg OD\nInj. Insulin 10 IU HS");
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Paracetamol", "Omeprazole", "Insulin"]);

        assert!(is_prefix_word("T."));
        assert!(!is_prefix_word("T"));
        assert!(!is_prefix_word("C"));
    }

    #[test]
    fn duration_only_instructions() {
        let entries = parse("Amoxicillin 500mg TID x 5 days");
        assert_eq!(entries[0].instructions.as_deref(), Some("5 days"));
    }

    #[test]
    fn header_lines_dropped() {
        let text = "Dr. A. Sharma MBBS\nPatient: John 45mg\nAge: 54 yrs\nDate: 12/05/2024\nMetformin 500mg BD\nSignature";
        let out = parse_medications(text);
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].name, "Metformin");
        assert_eq!(out.candidate_lines, 1);
    }

    #[test]
    fn plain_instruction_yields_nothing() {
        let out = parse_medications("Take 1 tablet twice daily");
        assert!(out.entries.is_empty());
        assert_eq!(out.candidate_lines, 0);
        assert_eq!(out.parsing_ratio(), 1.0);
    }

    #[test]
    fn name_only_lines_never_emit_alone() {
        assert!(parse("Metformin\nAmlodipine").is_empty());
    }

    #[test]
    fn name_line_followed_by_detail_line() {
        let out = parse_medications("Metformin\n500mg BD");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].name, "Metformin");
        assert_eq!(out.entries[0].strength, "500mg");
        assert_eq!(out.entries[0].frequency, "BD");
        assert_eq!(out.yielded_lines, 1);
    }

    #[test]
    fn detail_line_followed_by_name_line() {
        let out = parse_medications("500mg BD\nMetformin after food");
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].name, "Metformin");
        assert_eq!(out.entries[0].strength, "500mg");
        assert_eq!(out.entries[0].instructions.as_deref(), Some("after food"));
    }

    #[test]
    fn backfill_from_detail_only_line() {
        let out = parse_medications("Atorvastatin 10mg\nOD at night");
        assert_eq!(out.entries.len(), 1);
        let e = &out.entries[0];
        assert_eq!(e.strength, "10mg");
        assert_eq!(e.frequency, "OD");
        assert_eq!(e.instructions.as_deref(), Some("at night"));
        assert_eq!(out.candidate_lines, 2);
        assert_eq!(out.yielded_lines, 2);
    }

    #[test]
    fn backfill_never_steals_a_named_line() {
        let entries = parse("Atorvastatin 10mg\nAmlodipine OD");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].frequency, "");
        assert_eq!(entries[1].name, "Amlodipine");
    }

    #[test]
    fn complete_entry_takes_trailing_duration() {
        let entries = parse("Metformin 500mg BD\nfor 30 days\nAmlodipine 5mg OD");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].instructions.as_deref(), Some("30 days"));
        assert_eq!(entries[1].name, "Amlodipine");
    }

    #[test]
    fn verbatim_fallback_up_to_double_space() {
        let entries = parse("(2) 250mg  BD");
        assert_eq!(entries.len(), 0, "no letter outside tokens");

        let entries = parse("5x 250mg  BD");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "5x 250mg");
        assert_eq!(entries[0].frequency, "BD");
        assert_eq!(entries[0].instructions, None);
    }

    #[test]
    fn orphan_detail_line_is_an_unyielded_candidate() {
        let out = parse_medications("500mg BD");
        assert!(out.entries.is_empty());
        assert_eq!(out.candidate_lines, 1);
        assert_eq!(out.yielded_lines, 0);
        assert_eq!(out.parsing_ratio(), 0.0);
    }

    #[test]
    fn comma_lines_are_not_split() {
        let entries = parse("Metformin 500mg, Amlodipine 5mg");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Metformin");
        assert_eq!(entries[0].instructions.as_deref(), Some("Amlodipine 5mg"));
    }

    #[test]
    fn name_punctuation_trimmed() {
        let entries = parse("- Paracetamol: 650mg SOS for fever");
        assert_eq!(entries[0].name, "Paracetamol");
        assert_eq!(entries[0].frequency, "SOS");
        assert_eq!(entries[0].instructions.as_deref(), Some("for fever"));
    }

    #[test]
    fn every_entry_respects_invariant() {
        let text = "Rx\n\
                    Tab Metformin 500mg BD\n\
                    ???\n\
                    12 34\n\
                    OD\n\
                    Take with water\n\
                    Cap. Omeprazole 20mg\n\
                    1-0-1\n\
                    ab 5mg";
        for e in parse(text) {
            assert!(e.name.chars().any(char::is_alphabetic), "{e:?}");
            assert!(e.has_details(), "{e:?}");
        }
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "Tab. Metformin 500mg BD\nAmlodipine\n5mg OD\nfor 30 days";
        assert_eq!(parse(text), parse(text));
    }

    #[test]
    fn split_leading_name_cases() {
        let s = split_leading_name("Tab.  Vitamin D3   weekly after lunch");
        assert_eq!(s.name, "Vitamin D3");
        assert_eq!(s.leftover.as_deref(), Some("weekly after lunch"));

        let s = split_leading_name("A B C D E F");
        assert_eq!(s.name, "A B C D");

        let s = split_leading_name("   ");
        assert_eq!(s, NameSplit::default());
    }
}
