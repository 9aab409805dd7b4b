use std::borrow::Cow;

/// Removes control characters from feed-supplied text.
///
/// Feed XML is attacker-controlled; embedded terminal escape sequences would
/// otherwise survive into CLI output. Newlines and tabs are kept.
///
/// Returns `Cow::Borrowed` when the input is already clean (no allocation).
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    if s.chars().any(is_stripped_control) {
        Cow::Owned(s.chars().filter(|c| !is_stripped_control(*c)).collect())
    } else {
        Cow::Borrowed(s)
    }
}

fn is_stripped_control(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_input_is_borrowed() {
        let input = "Plain title";
        assert!(matches!(
            strip_control_chars(input),
            Cow::Borrowed("Plain title")
        ));
    }

    #[test]
    fn strips_ansi_escape() {
        let cleaned = strip_control_chars("Evil\x1b[31m Feed");
        assert!(!cleaned.contains('\x1b'));
        assert!(cleaned.contains("Evil"));
        assert!(cleaned.contains("Feed"));
    }

    #[test]
    fn strips_bell_and_null() {
        assert_eq!(strip_control_chars("a\x07b\0c"), "abc");
    }

    #[test]
    fn keeps_newline_and_tab() {
        assert_eq!(strip_control_chars("a\n\tb"), "a\n\tb");
    }
}
