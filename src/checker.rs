/// Compares program output with expected output
///
/// The trailing run of newline characters is stripped from both sides, the
/// rest must match byte for byte. Spaces at the start or end of a line and
/// empty lines in the middle of the output are significant.
pub fn equal(actual: &str, expected: &str) -> bool {
    strip_trailing_newlines(actual) == strip_trailing_newlines(expected)
}

#[inline]
fn strip_trailing_newlines(s: &str) -> &str {
    s.trim_end_matches(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_newlines_ignored() {
        assert!(equal("hello\nworld", "hello\nworld"));
        assert!(equal("hello\nworld\n", "hello\nworld"));
        assert!(equal("hello\nworld", "hello\nworld\n"));
        assert!(equal("hello\nworld\n\n", "hello\nworld"));
        assert!(equal("3\r\n", "3"));
    }

    #[test]
    fn test_whitespace_is_significant() {
        assert!(!equal("  hello  \n  world  ", "hello\nworld"));
        assert!(!equal("hello \nworld", "hello\nworld"));
        assert!(!equal("hello\n\nworld", "hello\nworld"));
        assert!(!equal("hello\nworld ", "hello\nworld"));
    }

    #[test]
    fn test_mismatch() {
        assert!(!equal("hello", "world"));
        assert!(!equal("hello\nworld", "hello\nearth"));
        assert!(!equal("Hello", "hello"));
        assert!(!equal("1.0", "1"));
    }

    #[test]
    fn test_reflexive_and_symmetric() {
        let samples = ["", "\n", "a", "a\n", " a ", "a\n\nb\n\n", "x\r\ny"];
        for a in samples {
            assert!(equal(a, a));
            for b in samples {
                assert_eq!(equal(a, b), equal(b, a), "{a:?} vs {b:?}");
            }
        }
    }

    #[test]
    fn test_empty_output() {
        assert!(equal("", ""));
        assert!(equal("\n", ""));
        assert!(!equal(" ", ""));
    }
}
