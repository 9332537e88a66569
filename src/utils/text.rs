// src/utils/text.rs

//! Text helpers for digests and summaries.

use std::borrow::Cow;

use scraper::Html;
use unicode_segmentation::UnicodeSegmentation;

/// Collapse all whitespace runs into single spaces.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip markup from an HTML fragment and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect();
    collapse_whitespace(&text)
}

fn is_word(segment: &str) -> bool {
    segment.chars().any(char::is_alphanumeric)
}

/// Number of words in `text`.
pub fn word_count(text: &str) -> usize {
    text.split_word_bounds().filter(|s| is_word(s)).count()
}

/// Keep at most `max_words` words; a clipped text ends with an ellipsis.
pub fn clip_words(text: &str, max_words: usize) -> Cow<'_, str> {
    let mut words = 0;
    for (idx, segment) in text.split_word_bound_indices() {
        if !is_word(segment) {
            continue;
        }
        if words == max_words {
            return Cow::Owned(format!("{}…", text[..idx].trim_end()));
        }
        words += 1;
    }
    Cow::Borrowed(text)
}
