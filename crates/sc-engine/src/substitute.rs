//! Text substitution and output wrapping.

/// Wrap handler output in level markers.
///
/// ```
/// use sc_engine::wrap_output;
///
/// assert_eq!(
///     wrap_output("menu", 2, "<ul></ul>"),
///     "<!--start menu 2 lvl--><ul></ul><!--end menu 2 lvl-->"
/// );
/// ```
#[must_use]
pub fn wrap_output(short_name: &str, level: u32, output: &str) -> String {
    format!("<!--start {short_name} {level} lvl-->{output}<!--end {short_name} {level} lvl-->")
}

/// Replace the first occurrence of `span` in `text` with `replacement`.
///
/// Returns `false` and leaves `text` untouched when `span` is absent.
pub fn substitute_once(text: &mut String, span: &str, replacement: &str) -> bool {
    match text.find(span) {
        Some(start) => {
            text.replace_range(start..start + span.len(), replacement);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_substitute_first_occurrence_only() {
        let mut text = "[[aaa#v]] and [[aaa#v]]".to_owned();

        assert!(substitute_once(&mut text, "[[aaa#v]]", "R"));

        assert_eq!(text, "R and [[aaa#v]]");
    }

    #[test]
    fn test_substitute_missing_span_is_noop() {
        let mut text = "nothing here".to_owned();

        assert!(!substitute_once(&mut text, "[[aaa#v]]", "R"));

        assert_eq!(text, "nothing here");
    }

    #[test]
    fn test_substitute_with_empty() {
        let mut text = "a [[aaa#v]] b".to_owned();

        substitute_once(&mut text, "[[aaa#v]]", "");

        assert_eq!(text, "a  b");
    }

    #[test]
    fn test_substitute_multibyte() {
        let mut text = "привет [[aaa#v]] мир".to_owned();

        substitute_once(&mut text, "[[aaa#v]]", "ok");

        assert_eq!(text, "привет ok мир");
    }

    #[test]
    fn test_wrap_output() {
        assert_eq!(
            wrap_output("menu", 1, "R"),
            "<!--start menu 1 lvl-->R<!--end menu 1 lvl-->"
        );
    }
}
