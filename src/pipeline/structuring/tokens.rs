//! Detail-token recognizers for prescription lines.
//!
//! Each recognizer finds at most one token per line. Frequency has two
//! recognizers: coded abbreviations win over dash/slash dose patterns.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// `500mg`, `2.5 mg`, `10 IU`, `100 mcg/ml`
static STRENGTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d+(?:\.\d+)?\s?(?:mcg/ml|mg/ml|mcg|mg|ml|iu|g)\b").unwrap()
});

/// Latin-derived schedule codes.
static FREQUENCY_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:OD|BD|BID|TID|QID|QHS|HS|PRN|SOS|Q(?:2|4|6|8|12)H)\b").unwrap()
});

/// Morning-noon-night dose counts such as `1-0-1` or `1/2`. Single digits
/// only, so blood pressures (`130/80`) and dates never qualify.
static DOSE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[0-9](?:\s*[-/]\s*[0-9]){1,3}\b").unwrap()
});

/// `5 days`, `x 2 weeks`, `x5days`, `for 3 months`; the connector is absorbed.
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\b(?:x|for)\s*|\b)(\d+)\s*(days?|weeks?|months?)\b").unwrap()
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognizer {
    Strength,
    FrequencyCode,
    DosePattern,
    Duration,
}

/// One recognized token and where it sits in the line (byte offsets).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenMatch {
    pub recognizer: Recognizer,
    /// Normalized token text.
    pub value: String,
    pub span: Range<usize>,
}

impl Recognizer {
    pub const ALL: [Recognizer; 4] = [
        Recognizer::Strength,
        Recognizer::FrequencyCode,
        Recognizer::DosePattern,
        Recognizer::Duration,
    ];

    pub fn recognize(&self, line: &str) -> Option<TokenMatch> {
        match self {
            Self::Strength => STRENGTH.find(line).map(|m| TokenMatch {
                recognizer: *self,
                value: m.as_str().to_string(),
                span: m.range(),
            }),
            Self::FrequencyCode => FREQUENCY_CODE.find(line).map(|m| TokenMatch {
                recognizer: *self,
                value: m.as_str().to_string(),
                span: m.range(),
            }),
            Self::DosePattern => DOSE_PATTERN.find(line).map(|m| TokenMatch {
                recognizer: *self,
                value: m.as_str().split_whitespace().collect(),
                span: m.range(),
            }),
            Self::Duration => DURATION.captures(line).and_then(|c| {
                let whole = c.get(0)?;
                let count = c.get(1)?.as_str();
                let unit = c.get(2)?.as_str().to_lowercase();
                Some(TokenMatch {
                    recognizer: *self,
                    value: format!("{count} {unit}"),
                    span: whole.range(),
                })
            }),
        }
    }
}

/// Detail tokens found on one line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineTokens {
    pub strength: Option<TokenMatch>,
    pub frequency: Option<TokenMatch>,
    pub duration: Option<TokenMatch>,
}

impl LineTokens {
    pub fn is_empty(&self) -> bool {
        self.strength.is_none() && self.frequency.is_none() && self.duration.is_none()
    }

    pub fn spans(&self) -> impl Iterator<Item = &Range<usize>> {
        [&self.strength, &self.frequency, &self.duration]
            .into_iter()
            .flatten()
            .map(|t| &t.span)
    }

    pub fn strength_value(&self) -> String {
        self.strength.as_ref().map(|t| t.value.clone()).unwrap_or_default()
    }

    pub fn frequency_value(&self) -> String {
        self.frequency.as_ref().map(|t| t.value.clone()).unwrap_or_default()
    }

    pub fn duration_value(&self) -> Option<String> {
        self.duration.as_ref().map(|t| t.value.clone())
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Run every recognizer over `line`.
///
/// Later recognizers may not claim text an earlier one already took, so a
/// strength such as `5mg` never doubles as part of a duration or pattern.
pub fn scan_line(line: &str) -> LineTokens {
    let mut tokens = LineTokens::default();
    let mut taken: Vec<Range<usize>> = Vec::new();

    for recognizer in Recognizer::ALL {
        let slot_filled = match recognizer {
            Recognizer::Strength => tokens.strength.is_some(),
            Recognizer::FrequencyCode | Recognizer::DosePattern => tokens.frequency.is_some(),
            Recognizer::Duration => tokens.duration.is_some(),
        };
        if slot_filled {
            continue;
        }

        let Some(found) = recognizer.recognize(line) else {
            continue;
        };
        if taken.iter().any(|t| overlaps(t, &found.span)) {
            continue;
        }

        taken.push(found.span.clone());
        match recognizer {
            Recognizer::Strength => tokens.strength = Some(found),
            Recognizer::FrequencyCode | Recognizer::DosePattern => tokens.frequency = Some(found),
            Recognizer::Duration => tokens.duration = Some(found),
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strength_variants() {
        for (line, expected) in [
            ("Metformin 500mg", "500mg"),
            ("Amlodipine 2.5 mg", "2.5 mg"),
            ("Insulin 10 IU at night", "10 IU"),
            ("Syrup 5ml", "5ml"),
            ("Vitamin D 1000 mcg", "1000 mcg"),
            ("Drops 20 mcg/ml", "20 mcg/ml"),
            ("Calcium 1g", "1g"),
        ] {
            let m = Recognizer::Strength.recognize(line).expect(line);
            assert_eq!(m.value, expected, "{line}");
        }
    }

    #[test]
    fn strength_requires_unit() {
        assert!(Recognizer::Strength.recognize("Take 2 tablets").is_none());
        assert!(Recognizer::Strength.recognize("500 mgs").is_none());
    }

    #[test]
    fn frequency_codes_case_insensitive() {
        for code in ["OD", "bd", "BID", "tid", "QID", "HS", "QHS", "PRN", "SOS", "Q6H", "q12h"] {
            let line = format!("Drug 5mg {code}");
            let m = Recognizer::FrequencyCode.recognize(&line).expect(code);
            assert_eq!(m.value, code);
        }
    }

    #[test]
    fn frequency_code_needs_word_boundary() {
        assert!(Recognizer::FrequencyCode.recognize("Road Bodhi").is_none());
        assert!(Recognizer::FrequencyCode.recognize("Methods").is_none());
    }

    #[test]
    fn dose_patterns() {
        assert_eq!(Recognizer::DosePattern.recognize("Tab 1-0-1").unwrap().value, "1-0-1");
        assert_eq!(Recognizer::DosePattern.recognize("Tab 1 - 1 - 1").unwrap().value, "1-1-1");
        assert_eq!(Recognizer::DosePattern.recognize("half 1/2 tab").unwrap().value, "1/2");
        assert_eq!(Recognizer::DosePattern.recognize("1-0-0-1 daily").unwrap().value, "1-0-0-1");
    }

    #[test]
    fn dose_pattern_ignores_vitals_and_dates() {
        assert!(Recognizer::DosePattern.recognize("BP 130/80").is_none());
        assert!(Recognizer::DosePattern.recognize("Date 12/05/2024").is_none());
    }

    #[test]
    fn duration_absorbs_connector() {
        let line = "Amoxicillin 500mg TID x 5 days";
        let m = Recognizer::Duration.recognize(line).unwrap();
        assert_eq!(m.value, "5 days");
        assert_eq!(&line[m.span.clone()], "x 5 days");

        let line = "for 2 Weeks";
        let m = Recognizer::Duration.recognize(line).unwrap();
        assert_eq!(m.value, "2 weeks");
        assert_eq!(m.span, 0..line.len());
    }

    #[test]
    fn duration_shorthand_without_spaces() {
        let line = "Metformin SR 500 mg BD x5days";
        let m = Recognizer::Duration.recognize(line).unwrap();
        assert_eq!(m.value, "5 days");
        assert_eq!(&line[m.span.clone()], "x5days");

        let line = "Cefixime 200mg BD x 5days";
        let m = Recognizer::Duration.recognize(line).unwrap();
        assert_eq!(m.value, "5 days");
        assert_eq!(&line[m.span.clone()], "x 5days");

        assert!(Recognizer::Duration.recognize("Box5days").is_none());
    }

    #[test]
    fn code_wins_over_pattern() {
        let tokens = scan_line("Metformin 500mg BD 1-0-1");
        assert_eq!(tokens.frequency_value(), "BD");
        assert_eq!(tokens.frequency.unwrap().recognizer, Recognizer::FrequencyCode);
    }

    #[test]
    fn scan_collects_all_slots() {
        let tokens = scan_line("Amoxicillin 500mg TID x 5 days");
        assert_eq!(tokens.strength_value(), "500mg");
        assert_eq!(tokens.frequency_value(), "TID");
        assert_eq!(tokens.duration_value().as_deref(), Some("5 days"));
        assert_eq!(tokens.spans().count(), 3);
    }

    #[test]
    fn scan_plain_instruction_has_no_tokens() {
        assert!(scan_line("Take 1 tablet twice daily").is_empty());
        assert!(scan_line("Metformin").is_empty());
    }

    #[test]
    fn ordered_recognizers_cover_every_variant() {
        assert_eq!(Recognizer::ALL.len(), 4);
        assert_eq!(Recognizer::ALL[1], Recognizer::FrequencyCode);
        assert_eq!(Recognizer::ALL[2], Recognizer::DosePattern);
    }
}
