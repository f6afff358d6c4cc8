//! Per-type evidence aggregation.

use std::cmp::Ordering;

use crate::matcher::{match_condition, score_document, CodeCrosswalk};
use crate::models::{
    ConditionEvidence, Document, DocumentEvidence, Evidence, PatientCondition, ScreeningType,
};

/// Everything that matched one screening type for one patient.
#[derive(Debug, Clone)]
pub struct EvidenceSet {
    /// The single piece of evidence that satisfies the screening, if any
    pub best: Option<Evidence>,
    /// All matched documents: date desc, then score desc, then id
    pub documents: Vec<DocumentEvidence>,
}

/// Gather and rank all evidence for one screening type.
///
/// Trigger matches collapse to the single most recent one. The best
/// overall evidence is the most recent across both sources; on a date
/// tie the condition wins (coded data over keyword inference).
pub fn gather(
    ty: &ScreeningType,
    conditions: &[PatientCondition],
    documents: &[Document],
    crosswalk: &CodeCrosswalk,
) -> EvidenceSet {
    let mut condition_matches: Vec<ConditionEvidence> = conditions
        .iter()
        .filter_map(|cond| match_condition(ty, cond, crosswalk))
        .collect();
    condition_matches.sort_by(|a, b| {
        b.evidence_date
            .cmp(&a.evidence_date)
            .then_with(|| {
                b.confidence
                    .partial_cmp(&a.confidence)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.condition_id.cmp(&b.condition_id))
    });
    let best_condition = condition_matches.into_iter().next();

    let mut document_matches: Vec<DocumentEvidence> = documents
        .iter()
        .filter_map(|doc| score_document(ty, doc))
        .collect();
    document_matches.sort_by(|a, b| {
        b.evidence_date
            .cmp(&a.evidence_date)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal))
            .then_with(|| a.document_id.cmp(&b.document_id))
    });

    let best = match (best_condition, document_matches.first()) {
        (Some(cond), Some(doc)) => {
            if doc.evidence_date > cond.evidence_date {
                Some(Evidence::Document(doc.clone()))
            } else {
                Some(Evidence::Condition(cond))
            }
        }
        (Some(cond), None) => Some(Evidence::Condition(cond)),
        (None, Some(doc)) => Some(Evidence::Document(doc.clone())),
        (None, None) => None,
    };

    EvidenceSet {
        best,
        documents: document_matches,
    }
}
