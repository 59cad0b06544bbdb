/// Punctuation and symbols that carry meaning on a prescription.
const KEPT_SYMBOLS: &[char] = &[
    '.', ',', ';', ':', '-', '/', '(', ')', '[', ']', '+', '=', '%', '#', '@', '&', '\'', '"',
    '!', '?', '<', '>', '*', '_', '°', '²', '³', 'µ', '½', '¼', '¾', '•',
];

/// Sanitize extracted text before passing it to the line parser.
///
/// Strips control characters and stray symbols, folds typographic dashes
/// and the multiplication sign into ASCII so dose patterns (`1–0–1`,
/// `× 5 days`) look the same as typed ones, expands tabs to a double space
/// (a column gap), trims each line and drops blank lines. Interior runs of
/// spaces are kept: the parser treats a double space as a field separator.
pub fn sanitize_extracted_text(raw: &str) -> String {
    let mut folded = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\u{2010}'..='\u{2015}' | '\u{2212}' => folded.push('-'),
            '\u{2018}' | '\u{2019}' => folded.push('\''),
            '\u{201C}' | '\u{201D}' => folded.push('"'),
            '×' => folded.push('x'),
            '\t' => folded.push_str("  "),
            '\r' => {}
            c if c == '\n' || c == ' ' => folded.push(c),
            c if c.is_alphanumeric() || KEPT_SYMBOLS.contains(&c) => folded.push(c),
            c if c.is_whitespace() => folded.push(' '),
            _ => {}
        }
    }

    folded
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
