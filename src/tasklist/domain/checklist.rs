//! Markdown checklist grammar.
//!
//! A checklist item is a line starting with `- [ ]`, `- [x]` or `- [X]`,
//! followed by at least one space or tab and the item text. Every other line
//! is ignored. Items keep their line order.

use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::LazyLock;

#[expect(
    clippy::expect_used,
    reason = "the checklist pattern is a literal validated by the unit tests"
)]
static CHECKLIST_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(- \[([ xX])\][ \t]+)(\S.*?)([ \t]*\r?)$")
        .expect("checklist pattern compiles")
});

/// One checkbox line of an issue body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    /// Item text with surrounding whitespace removed.
    pub text: String,
    /// Whether the box is ticked.
    pub checked: bool,
}

impl ChecklistItem {
    /// Creates a checklist item.
    #[must_use]
    pub fn new(text: impl Into<String>, checked: bool) -> Self {
        Self {
            text: text.into(),
            checked,
        }
    }
}

/// Extracts checklist items from an issue body, in line order.
#[must_use]
pub fn parse_checklist(body: &str) -> Vec<ChecklistItem> {
    CHECKLIST_ITEM
        .captures_iter(body)
        .map(|caps| ChecklistItem {
            text: group(&caps, 3).to_owned(),
            checked: group(&caps, 2).eq_ignore_ascii_case("x"),
        })
        .collect()
}

/// Returns `true` when the body contains at least one checklist item.
#[must_use]
pub fn has_checklist(body: &str) -> bool {
    CHECKLIST_ITEM.is_match(body)
}

/// Replaces the text of checklist items whose whole text equals a key of
/// `replacements`.
///
/// The checkbox prefix, trailing whitespace and line endings are kept. The
/// match covers the full item text, so replacing `10` leaves
/// `- [ ] 10 something` untouched.
#[must_use]
pub fn rewrite_checklist<S>(body: &str, replacements: &HashMap<String, String, S>) -> String
where
    S: std::hash::BuildHasher,
{
    if replacements.is_empty() {
        return body.to_owned();
    }
    CHECKLIST_ITEM
        .replace_all(body, |caps: &Captures<'_>| {
            let text = group(caps, 3);
            let replaced = replacements.get(text).map_or(text, String::as_str);
            format!("{}{}{}", group(caps, 1), replaced, group(caps, 4))
        })
        .into_owned()
}

fn group<'h>(caps: &Captures<'h>, index: usize) -> &'h str {
    caps.get(index).map_or("", |m| m.as_str())
}
