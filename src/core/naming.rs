//! Source-to-destination column naming (`HasVatDividend` -> `HAS_VAT_DIVIDEND`).

/// Converts a CamelCase source name to UPPER_SNAKE_CASE.
///
/// Pass one puts `_` in front of every capitalized word (an uppercase letter
/// followed by a lowercase one) that has something before it. Pass two puts
/// `_` between a lowercase letter or digit and the uppercase letter after it.
/// Runs of capitals such as `OCR` stay together.
pub fn to_upper_snake(name: &str) -> String {
    let words_split = split_capitalized_words(name);
    split_lower_upper(&words_split).to_ascii_uppercase()
}

fn split_capitalized_words(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        let starts_word = c.is_ascii_uppercase()
            && chars.get(i + 1).is_some_and(|next| next.is_ascii_lowercase());
        if i > 0 && starts_word {
            out.push('_');
        }
        out.push(c);
    }
    out
}

fn split_lower_upper(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;
    for c in name.chars() {
        if let Some(p) = prev {
            if (p.is_ascii_lowercase() || p.is_ascii_digit()) && c.is_ascii_uppercase() {
                out.push('_');
            }
        }
        out.push(c);
        prev = Some(c);
    }
    out
}
