//! Legal-structure-aware text chunker.
//!
//! Splits document body text into [`Clause`]s bounded by a `max_chars`
//! limit. Splitting prefers legal section boundaries (headers, numbered
//! sections, "WHEREAS" clauses and friends) over raw size, so each clause
//! stays semantically coherent. When a document shows no recognizable
//! structure, a word-packing fallback produces fixed-size chunks instead.

use std::sync::OnceLock;

use regex::Regex;

use crate::models::Clause;

pub const DEFAULT_MAX_CHARS: usize = 1200;

/// Paragraph-start patterns that open a new section. Order matters only
/// for readability; any match flushes the accumulator.
const SECTION_PATTERNS: &[&str] = &[
    r"\A\*\*[A-Z\s]+\*\*$",    // **SECTION HEADERS**
    r"\A[A-Z\s]{3,}:$",        // SECTION HEADERS:
    r"\A\d+\.\s+[A-Z]",        // 1. Numbered sections
    r"\AClause\s+\d+",         // Clause 1
    r"\AArticle\s+\d+",        // Article 1
    r"\ASection\s+\d+",        // Section 1
    r"\AWHEREAS\b",            // WHEREAS clauses
    r"\ANOW\s+THEREFORE",      // NOW THEREFORE
    r"\AIN\s+WITNESS\s+WHEREOF", // IN WITNESS WHEREOF
    r"\ABY\s+AND\s+BETWEEN",   // BY AND BETWEEN
];

fn section_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        SECTION_PATTERNS
            .iter()
            .map(|p| Regex::new(&format!("(?im){}", p)).expect("valid section pattern"))
            .collect()
    })
}

fn split_paragraphs(text: &str) -> Vec<&str> {
    static SEP: OnceLock<Regex> = OnceLock::new();
    let sep = SEP.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid paragraph separator"));
    sep.split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

/// Split `text` into ordered clauses, flushing at section boundaries and
/// whenever appending a paragraph would exceed `max_chars`.
///
/// Returns `section_<n>`-labeled clauses, or `chunk_<n>`-labeled clauses
/// from the word-packing fallback when at most one section was found in a
/// document longer than `max_chars`. Empty input yields an empty vec. The
/// size cap is soft: a single token longer than `max_chars` is emitted
/// whole, never split.
pub fn chunk_into_clauses(text: &str, max_chars: usize) -> Vec<Clause> {
    let mut clauses: Vec<Clause> = Vec::new();
    let mut buf = String::new();
    let mut next_id = 0usize;

    for para in split_paragraphs(text) {
        let is_section_start = section_patterns().iter().any(|p| p.is_match(para));

        if is_section_start && !buf.is_empty() {
            flush_section(&mut clauses, &mut buf, &mut next_id);
            buf.push_str(para);
            continue;
        }

        let would_be = if buf.is_empty() {
            para.len()
        } else {
            buf.len() + 2 + para.len() // +2 for the \n\n separator
        };

        if would_be > max_chars && !buf.is_empty() {
            flush_section(&mut clauses, &mut buf, &mut next_id);
        }
        if !buf.is_empty() {
            buf.push_str("\n\n");
        }
        buf.push_str(para);
    }

    if !buf.is_empty() {
        flush_section(&mut clauses, &mut buf, &mut next_id);
    }

    // No usable structure found: fall back to plain word packing.
    if clauses.len() <= 1 && text.len() > max_chars {
        return word_fallback(text, max_chars);
    }

    clauses
}

fn flush_section(clauses: &mut Vec<Clause>, buf: &mut String, next_id: &mut usize) {
    clauses.push(Clause {
        id: format!("section_{}", next_id),
        text: std::mem::take(buf),
    });
    *next_id += 1;
}

/// Greedily pack whitespace-delimited words into `max_chars`-bounded
/// chunks. Never splits inside a token.
fn word_fallback(text: &str, max_chars: usize) -> Vec<Clause> {
    let mut clauses: Vec<Clause> = Vec::new();
    let mut buf = String::new();
    let mut next_id = 0usize;

    for word in text.split_whitespace() {
        let would_be = if buf.is_empty() {
            word.len()
        } else {
            buf.len() + 1 + word.len()
        };

        if would_be > max_chars && !buf.is_empty() {
            clauses.push(Clause {
                id: format!("chunk_{}", next_id),
                text: std::mem::take(&mut buf),
            });
            next_id += 1;
        }
        if !buf.is_empty() {
            buf.push(' ');
        }
        buf.push_str(word);
    }

    if !buf.is_empty() {
        clauses.push(Clause {
            id: format!("chunk_{}", next_id),
            text: buf,
        });
    }

    clauses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip_whitespace(s: &str) -> String {
        s.chars().filter(|c| !c.is_whitespace()).collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(chunk_into_clauses("", 1200).is_empty());
        assert!(chunk_into_clauses("   \n\n  ", 1200).is_empty());
    }

    #[test]
    fn test_small_text_single_clause() {
        let clauses = chunk_into_clauses("Hello, world!", 1200);
        assert_eq!(clauses.len(), 1);
        assert_eq!(clauses[0].id, "section_0");
        assert_eq!(clauses[0].text, "Hello, world!");
    }

    #[test]
    fn test_section_headers_split() {
        let text = "BY AND BETWEEN the parties named below.\n\n\
                    WHEREAS the tenant wishes to lease the premises.\n\n\
                    Clause 1. Rent shall be paid monthly.\n\n\
                    Clause 2. The notice period is thirty days.";
        let clauses = chunk_into_clauses(text, 1200);
        assert_eq!(clauses.len(), 4);
        assert!(clauses[0].text.starts_with("BY AND BETWEEN"));
        assert!(clauses[1].text.starts_with("WHEREAS"));
        assert!(clauses[2].text.starts_with("Clause 1"));
        assert!(clauses[3].text.starts_with("Clause 2"));
    }

    #[test]
    fn test_section_ids_monotonic() {
        let text = "Article 1 Scope.\n\nArticle 2 Term.\n\nArticle 3 Fees.";
        let clauses = chunk_into_clauses(text, 1200);
        for (i, c) in clauses.iter().enumerate() {
            assert_eq!(c.id, format!("section_{}", i));
        }
    }

    #[test]
    fn test_case_insensitive_patterns() {
        let text = "Preamble text here.\n\nwhereas the parties agree.\n\nsection 4 applies.";
        let clauses = chunk_into_clauses(text, 1200);
        assert_eq!(clauses.len(), 3);
    }

    #[test]
    fn test_size_flush_without_structure() {
        // Three paragraphs of ~40 chars with a 60-char budget: each flush
        // happens when appending would overflow.
        let text = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\n\n\
                    bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\n\n\
                    cccccccccccccccccccccccccccccccccccccccc";
        let clauses = chunk_into_clauses(text, 60);
        assert_eq!(clauses.len(), 3);
    }

    #[test]
    fn test_reconstruction_no_loss() {
        let text = "WHEREAS alpha beta.\n\nSome body text follows here.\n\n\
                    Clause 9. Gamma delta epsilon.\n\nMore trailing prose.";
        let clauses = chunk_into_clauses(text, 50);
        let rebuilt: String = clauses.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(strip_whitespace(&rebuilt), strip_whitespace(text));
    }

    #[test]
    fn test_fallback_reconstruction_no_loss() {
        let words: Vec<String> = (0..200).map(|i| format!("word{}", i)).collect();
        let text = words.join(" ");
        let clauses = chunk_into_clauses(&text, 80);
        assert!(clauses.len() > 1);
        assert!(clauses[0].id.starts_with("chunk_"));
        let rebuilt = clauses
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(strip_whitespace(&rebuilt), strip_whitespace(&text));
    }

    #[test]
    fn test_fallback_never_splits_tokens() {
        let words: Vec<String> = (0..50).map(|i| format!("token{:03}", i)).collect();
        let text = words.join(" ");
        let clauses = chunk_into_clauses(&text, 40);
        for clause in &clauses {
            for word in clause.text.split_whitespace() {
                assert!(
                    words.iter().any(|w| w == word),
                    "token split across clauses: {:?}",
                    word
                );
            }
        }
    }

    #[test]
    fn test_oversized_token_emitted_whole() {
        let long_word = "x".repeat(100);
        let text = format!("{} short tail words {}", long_word, "y".repeat(90));
        let clauses = chunk_into_clauses(&text, 50);
        assert!(clauses.iter().any(|c| c.text.contains(&long_word)));
    }

    #[test]
    fn test_single_section_over_budget_uses_fallback() {
        // One long unstructured paragraph: structural pass yields a single
        // clause, so the fallback kicks in.
        let text = "lorem ipsum dolor sit amet ".repeat(20);
        let clauses = chunk_into_clauses(text.trim(), 100);
        assert!(clauses.len() > 1);
        assert!(clauses.iter().all(|c| c.id.starts_with("chunk_")));
    }

    #[test]
    fn test_deterministic() {
        let text = "Section 1 Alpha.\n\nSection 2 Beta.\n\nSection 3 Gamma.";
        let a = chunk_into_clauses(text, 1200);
        let b = chunk_into_clauses(text, 1200);
        assert_eq!(a, b);
    }
}
