//! Weighted keyword scoring of documents.
//!
//! Each keyword counts at most once per document, whether it hits the
//! content, the filename, or both. Score is the sum of matched weights;
//! confidence is score over the type's total keyword weight, capped at 1.0.

use serde::Serialize;
use tracing::debug;

use crate::models::{Document, DocumentEvidence, Keyword, ScreeningType};

use super::normalize::{contains_token_sequence, tokenize};

/// Score one document against one screening type. None when the type has
/// no keywords or nothing hits.
pub fn score_document(ty: &ScreeningType, doc: &Document) -> Option<DocumentEvidence> {
    if ty.keywords.is_empty() {
        return None;
    }
    if doc.content.is_empty() {
        debug!(
            document_id = %doc.id,
            filename = %doc.filename,
            "document has no extracted text, matching filename only"
        );
    }

    let (matched, score) = matched_keywords(ty, &doc.content, &doc.filename);
    if matched.is_empty() {
        return None;
    }

    let total = ty.total_keyword_weight();
    Some(DocumentEvidence {
        document_id: doc.id.clone(),
        matched_keywords: matched,
        score,
        confidence: (score / total).min(1.0),
        evidence_date: doc.document_date,
    })
}

/// Result of an admin keyword preview against sample text.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeywordPreview {
    pub matched_keywords: Vec<String>,
    pub score: f64,
    pub confidence: f64,
}

/// Run a screening type's keywords against free-form sample text, for
/// tuning keyword sets without saving a document.
pub fn preview_keywords(ty: &ScreeningType, sample_text: &str) -> KeywordPreview {
    let (matched, score) = matched_keywords(ty, sample_text, "");
    let total = ty.total_keyword_weight();
    let confidence = if total > 0.0 {
        (score / total).min(1.0)
    } else {
        0.0
    };
    KeywordPreview {
        matched_keywords: matched,
        score,
        confidence,
    }
}

/// Keywords that hit either the content or the filename, in catalog order,
/// with their summed weight.
fn matched_keywords(ty: &ScreeningType, content: &str, filename: &str) -> (Vec<String>, f64) {
    let mut matched = Vec::new();
    let mut score = 0.0;
    for kw in &ty.keywords {
        if keyword_hits(kw, content) || keyword_hits(kw, filename) {
            matched.push(kw.text.clone());
            score += kw.weight;
        }
    }
    (matched, score)
}

/// Whether a single keyword hits a single text field.
fn keyword_hits(kw: &Keyword, text: &str) -> bool {
    if text.is_empty() {
        return false;
    }
    if kw.case_sensitive {
        hits(text, &kw.text, kw.exact_match)
    } else {
        hits(&text.to_lowercase(), &kw.text.to_lowercase(), kw.exact_match)
    }
}

fn hits(haystack: &str, needle: &str, exact: bool) -> bool {
    if exact {
        contains_token_sequence(&tokenize(haystack), &tokenize(needle))
    } else {
        haystack.contains(needle)
    }
}
