//! Search phrase cleanup shared by article and image listings

use crate::models::capitalize;

/// Split a free-text phrase into capitalized search words.
///
/// ASCII punctuation and digits act as separators. A word ending in `s` is
/// also searched without it, so "Sports" matches the tag "Sport".
pub fn clean_search_phrase(phrase: &str) -> Vec<String> {
    let cleaned: String = phrase
        .chars()
        .map(|c| if c.is_ascii_punctuation() || c.is_ascii_digit() { ' ' } else { c })
        .collect();

    let mut words = Vec::new();
    for word in cleaned.split_whitespace() {
        let word = capitalize(word);
        let singular = word.strip_suffix('s').map(str::to_string);
        words.push(word);
        if let Some(singular) = singular {
            words.push(singular);
        }
    }
    words
}
