//! Keyword gate for legal and government documents.
//!
//! The pipeline only answers questions about legal material. Classification
//! is a case-insensitive substring count against a fixed keyword list; a
//! document passes when it reaches the configured hit threshold.

/// Vocabulary covering contract language, Indian government terminology,
/// jurisdictions, and procurement paperwork.
pub const LEGAL_KEYWORDS: &[&str] = &[
    // Contract language
    "agreement",
    "contract",
    "terms",
    "conditions",
    "whereas",
    "party",
    "clause",
    "liability",
    "indemnity",
    "breach",
    "terminate",
    "jurisdiction",
    "arbitration",
    // Government and regulatory
    "government",
    "ministry",
    "department",
    "act",
    "section",
    "subsection",
    "regulation",
    "rule",
    "notification",
    "circular",
    "order",
    "directive",
    "policy",
    "guidelines",
    "procedure",
    "compliance",
    "statutory",
    "legal",
    // Indian jurisdictions and context
    "maharashtra",
    "delhi",
    "mumbai",
    "kolkata",
    "chennai",
    "bangalore",
    "indian",
    "india",
    "rupees",
    "crores",
    "lakhs",
    "gst",
    "pan",
    "aadhar",
    // Procurement and official paperwork
    "tender",
    "rfp",
    "proposal",
    "bid",
    "procurement",
    "purchase order",
    "invoice",
    "receipt",
    "certificate",
    "license",
    "permit",
    "registration",
];

/// Count how many keywords occur in `text` at least once. Each keyword
/// contributes at most one hit regardless of how often it repeats.
pub fn legal_keyword_hits(text: &str) -> usize {
    let lower = text.to_lowercase();
    LEGAL_KEYWORDS
        .iter()
        .filter(|&&kw| lower.contains(kw))
        .count()
}

/// True when `text` reaches `min_hits` distinct keyword matches.
pub fn is_legal_document(text: &str, min_hits: usize) -> bool {
    legal_keyword_hits(text) >= min_hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_no_hits() {
        assert_eq!(legal_keyword_hits(""), 0);
        assert!(!is_legal_document("", 1));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(legal_keyword_hits("AGREEMENT"), legal_keyword_hits("agreement"));
        assert!(legal_keyword_hits("This AGREEMENT sets out the Terms and CONDITIONS") >= 3);
    }

    #[test]
    fn test_repeated_keyword_counts_once() {
        assert_eq!(legal_keyword_hits("contract contract contract"), 1);
    }

    #[test]
    fn test_legal_document_passes_default_threshold() {
        let text = "This rental agreement between the parties includes a clause on \
                    liability and termination under Indian jurisdiction.";
        assert!(is_legal_document(text, 3));
    }

    #[test]
    fn test_casual_text_rejected() {
        let text = "Here is my grocery list: milk, eggs, bread, and some apples.";
        assert!(!is_legal_document(text, 3));
    }

    #[test]
    fn test_hits_monotonic_in_text() {
        let base = "This agreement covers liability.";
        let extended = format!("{} Arbitration applies under the act.", base);
        assert!(legal_keyword_hits(&extended) >= legal_keyword_hits(base));
    }
}
