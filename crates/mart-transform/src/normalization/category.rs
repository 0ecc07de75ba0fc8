use mart_model::CaseFoldMap;

/// Map a raw category onto its canonical spelling.
///
/// Unknown categories fall back to title case.
pub fn normalize_category(raw: &str, synonyms: &CaseFoldMap) -> String {
    match synonyms.get(raw) {
        Some(canonical) => canonical.to_string(),
        None => title_case(raw),
    }
}

/// Title-case each whitespace-separated word and collapse spacing.
///
/// Hyphenated parts are capitalized too: `new-delhi` becomes `New-Delhi`.
pub fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(title_word)
        .collect::<Vec<String>>()
        .join(" ")
}

fn title_word(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut at_start = true;
    for c in word.chars() {
        if at_start {
            out.extend(c.to_uppercase());
        } else {
            out.extend(c.to_lowercase());
        }
        at_start = c == '-';
    }
    out
}
