use lazy_static::lazy_static;
use regex::Regex;
use std::borrow::Cow;

lazy_static! {
    /// Scheme URLs, `www.` hosts, and bare `label.tld[/path]` tokens.
    static ref URL_REGEX: Regex = Regex::new(
        r"https?://[^\s]+|www\.[^\s]+|[a-zA-Z0-9-]+\.[a-zA-Z]{2,}(?:/[^\s]*)?"
    )
    .expect("Invalid url regex");
    static ref WHITESPACE_REGEX: Regex = Regex::new(r"\s+").expect("Invalid whitespace regex");
}

/// Removes URL-shaped substrings for display, collapsing whitespace and trimming.
/// Lossy: nothing is escaped or preserved about the removed links.
pub fn strip_urls(text: &str) -> String {
    let without_urls = URL_REGEX.replace_all(text, "");
    WHITESPACE_REGEX
        .replace_all(&without_urls, " ")
        .trim()
        .to_string()
}

/// Safely returns a prefix of the string with at most `max_chars` characters.
/// This respects UTF-8 character boundaries.
pub fn prefix_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Returns the first `n` characters as a Cow<str>, avoiding allocation if possible.
pub fn first_n_chars_lossy(s: &str, n: usize) -> Cow<'_, str> {
    if s.chars().count() <= n {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(format!("{}...", prefix_chars(s, n)))
    }
}
