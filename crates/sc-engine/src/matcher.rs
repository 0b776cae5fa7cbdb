//! Directive syntax matching.
//!
//! Finds `[[NAME#VALUE]]` spans with a flat pattern. VALUE is captured
//! non-greedily up to the first `]]`, so a value containing literal brackets
//! may be split incorrectly. Such values are reported as [`BracketWarning`]s
//! and never corrected.

use std::sync::LazyLock;

use regex::Regex;

/// NAME is 3-45 word characters, VALUE is anything (newlines included) up to the first `]]`.
static DIRECTIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\[\[([A-Za-z0-9_]{3,45})#(.*?)\]\]").unwrap());

/// A directive occurrence found in text.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct DirectiveMatch {
    /// Exact span `[[name#value]]` as it appears in the text.
    pub full_text: String,
    /// Directive name (unprefixed).
    pub name: String,
    /// Raw directive value.
    pub value: String,
}

impl DirectiveMatch {
    /// Count stray brackets in the value.
    ///
    /// Returns `None` when the value contains neither `[` nor `]`.
    #[must_use]
    pub fn bracket_warning(&self) -> Option<BracketWarning> {
        let open = self.value.matches('[').count();
        let close = self.value.matches(']').count();
        (open > 0 || close > 0).then_some(BracketWarning { open, close })
    }
}

/// Bracket counts for a directive value that may have confused the matcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BracketWarning {
    /// Number of `[` in the value.
    pub open: usize,
    /// Number of `]` in the value.
    pub close: usize,
}

/// Cheap check for directive syntax.
///
/// Requires, in order, `[[`, then `#` after it, then `]]` after that. Text
/// failing this check cannot contain a directive; text passing it still may
/// not (e.g., a name that is too short).
#[must_use]
pub fn signs_directive(text: &str) -> bool {
    let Some(open) = text.find("[[") else {
        return false;
    };
    let after_open = open + 2;
    let Some(hash) = text[after_open..].find('#') else {
        return false;
    };
    text[after_open + hash + 1..].contains("]]")
}

/// Find every directive in `text`, in order of appearance.
#[must_use]
pub fn scan(text: &str) -> Vec<DirectiveMatch> {
    DIRECTIVE_RE
        .captures_iter(text)
        .map(|caps| DirectiveMatch {
            full_text: caps[0].to_owned(),
            name: caps[1].to_owned(),
            value: caps[2].to_owned(),
        })
        .collect()
}
