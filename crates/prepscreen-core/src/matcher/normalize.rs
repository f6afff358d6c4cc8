//! Text normalization for matching.

/// Normalize a display name: lowercase, strip punctuation, collapse
/// whitespace. "Type 2 Diabetes (Mellitus)" becomes "type 2 diabetes mellitus".
pub fn normalize_display(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut pending_space = false;
    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }
    out
}

/// Normalize a clinical code for comparison: trim and uppercase.
pub fn normalize_code(s: &str) -> String {
    s.trim().to_ascii_uppercase()
}

/// Split text into alphanumeric runs, preserving case.
pub fn tokenize(s: &str) -> Vec<&str> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whether `needle` appears as a contiguous token subsequence of `haystack`.
pub fn contains_token_sequence(haystack: &[&str], needle: &[&str]) -> bool {
    if needle.is_empty() || haystack.len() < needle.len() {
        return false;
    }
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_display() {
        assert_eq!(
            normalize_display("Type 2 Diabetes (Mellitus)"),
            "type 2 diabetes mellitus"
        );
        assert_eq!(normalize_display("  COPD, unspecified  "), "copd unspecified");
        assert_eq!(normalize_display("!!!"), "");
    }

    #[test]
    fn test_normalize_code() {
        assert_eq!(normalize_code(" e11.9 "), "E11.9");
        assert_eq!(normalize_code("44054006"), "44054006");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("mammogram_2024-03.pdf"),
            vec!["mammogram", "2024", "03", "pdf"]
        );
        assert_eq!(tokenize("Pap-smear done."), vec!["Pap", "smear", "done"]);
        assert!(tokenize("---").is_empty());
    }

    #[test]
    fn test_token_sequence() {
        let hay = tokenize("routine pap smear performed today");
        assert!(contains_token_sequence(&hay, &tokenize("pap smear")));
        assert!(contains_token_sequence(&hay, &tokenize("performed")));
        assert!(!contains_token_sequence(&hay, &tokenize("smear pap")));
        assert!(!contains_token_sequence(&hay, &tokenize("pap smears")));
        assert!(!contains_token_sequence(&hay, &[]));
    }
}
