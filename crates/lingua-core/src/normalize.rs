//! Deterministic text normalisation for tolerant answer comparison.

/// Lowercase, trim, drop punctuation (anything that is neither a word
/// character nor whitespace) and collapse whitespace runs to one space.
///
/// Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(input: &str) -> String {
    let lowered = input.to_lowercase();
    let kept: String = lowered
        .trim()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    collapse_whitespace(&kept)
}

/// Whitespace-separated tokens of the normalised form.
pub fn tokens(input: &str) -> Vec<String> {
    normalize(input)
        .split(' ')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalisation that keeps word order and case: collapses whitespace,
/// removes spaces in front of punctuation and inside parentheses.
pub fn normalize_sentence(input: &str) -> String {
    let collapsed = collapse_whitespace(input.trim());
    let chars: Vec<char> = collapsed.chars().collect();
    let mut out = String::with_capacity(collapsed.len());

    for (i, &c) in chars.iter().enumerate() {
        if c == ' ' {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let before_punct = next.is_some_and(|n| is_closing_punct(n));
            let after_open = prev == Some('(');
            if before_punct || after_open {
                continue;
            }
        }
        out.push(c);
    }
    out
}

/// Primary case-sensitive sentence comparison with a case-insensitive fallback.
pub fn sentences_match(user: &str, expected: &str) -> bool {
    let user = normalize_sentence(user);
    let expected = normalize_sentence(expected);
    user == expected || user.to_lowercase() == expected.to_lowercase()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn is_closing_punct(c: char) -> bool {
    matches!(c, '.' | ',' | '!' | '?' | ';' | ':' | ')')
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_basic() {
        assert_eq!(normalize("  Hello,   World! "), "hello world");
        assert_eq!(normalize("I'm here."), "im here");
        assert_eq!(normalize("snake_case stays"), "snake_case stays");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("?!..."), "");
    }

    #[test]
    fn normalize_keeps_cyrillic() {
        assert_eq!(normalize("  Привет,  МИР! "), "привет мир");
    }

    #[test]
    fn normalize_is_idempotent() {
        for s in [
            "  Hello,   World! ",
            "Tab\tseparated\nlines",
            "Ünïcödé — dashes – and “quotes”",
            "a  b   c",
            "(brackets) [and] {braces}",
        ] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn punctuation_between_words_collapses() {
        assert_eq!(normalize("well - known"), "well known");
    }

    #[test]
    fn tokens_split_normalised_form() {
        assert_eq!(tokens("I go, to school!"), vec!["i", "go", "to", "school"]);
        assert!(tokens("   ").is_empty());
    }

    #[test]
    fn sentence_normalisation() {
        assert_eq!(normalize_sentence("  I am   a student . "), "I am a student.");
        assert_eq!(normalize_sentence("Hello , world !"), "Hello, world!");
        assert_eq!(normalize_sentence("a ( b ) c"), "a (b) c");
    }

    #[test]
    fn sentences_match_with_case_fallback() {
        assert!(sentences_match("I am a student", "I am a student"));
        assert!(sentences_match("i am a student", "I am a student"));
        assert!(sentences_match("I  am a student .", "I am a student."));
        assert!(!sentences_match("am I a student", "I am a student"));
    }
}
