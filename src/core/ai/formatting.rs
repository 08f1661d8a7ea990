//! Formatting helpers for assistant replies shown in a terminal.

/// Maximum number of citations to display.
const MAX_CITATIONS: usize = 5;

/// Formats citation URLs as a numbered source list.
///
/// Returns `None` if there are no citations.
///
/// # Example Output
/// ```text
/// Sources:
///   [1] https://example.com
///   [2] https://example.org
/// ```
pub fn format_citations(citations: &[String]) -> Option<String> {
    if citations.is_empty() {
        return None;
    }

    let formatted: Vec<String> = citations
        .iter()
        .take(MAX_CITATIONS)
        .enumerate()
        .map(|(i, url)| format!("  [{}] {}", i + 1, url))
        .collect();

    let mut result = String::from("Sources:\n");
    result.push_str(&formatted.join("\n"));

    if citations.len() > MAX_CITATIONS {
        result.push_str(&format!(
            "\n  ...and {} more sources",
            citations.len() - MAX_CITATIONS
        ));
    }

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_citations() {
        assert_eq!(format_citations(&[]), None);
    }

    #[test]
    fn test_single_citation() {
        let citations = vec!["https://example.com".to_string()];
        let result = format_citations(&citations).unwrap();
        assert!(result.starts_with("Sources:"));
        assert!(result.contains("[1] https://example.com"));
    }

    #[test]
    fn test_max_citations_limit() {
        let citations: Vec<String> = (0..8).map(|i| format!("https://example{}.com", i)).collect();
        let result = format_citations(&citations).unwrap();
        assert!(result.contains("example0.com"));
        assert!(result.contains("example4.com"));
        assert!(!result.contains("example5.com"));
        assert!(result.contains("...and 3 more sources"));
    }
}
