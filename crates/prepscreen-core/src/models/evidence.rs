//! Evidence produced by condition and document matching.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Confidence assigned to an exact (system, code) trigger match.
pub const EXACT_CODE_CONFIDENCE: f64 = 1.0;
/// Confidence assigned to a match translated through the code crosswalk.
pub const CROSS_SYSTEM_CONFIDENCE: f64 = 0.75;
/// Confidence assigned to a display-name fallback match.
pub const DISPLAY_NAME_CONFIDENCE: f64 = 0.40;

/// How a condition matched a trigger list, strongest first.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    /// Same coding system, same code
    ExactCode,
    /// Code translated across systems via the crosswalk
    CrossSystem,
    /// Normalized display-name containment
    DisplayName,
}

impl MatchTier {
    /// Fixed confidence for this tier.
    pub fn confidence(&self) -> f64 {
        match self {
            MatchTier::ExactCode => EXACT_CODE_CONFIDENCE,
            MatchTier::CrossSystem => CROSS_SYSTEM_CONFIDENCE,
            MatchTier::DisplayName => DISPLAY_NAME_CONFIDENCE,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchTier::ExactCode => "exact_code",
            MatchTier::CrossSystem => "cross_system",
            MatchTier::DisplayName => "display_name",
        }
    }
}

/// Which kind of source satisfied a screening.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EvidenceKind {
    Condition,
    Document,
}

impl EvidenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Condition => "condition",
            EvidenceKind::Document => "document",
        }
    }

    pub fn parse(s: &str) -> Option<EvidenceKind> {
        match s {
            "condition" => Some(EvidenceKind::Condition),
            "document" => Some(EvidenceKind::Document),
            _ => None,
        }
    }
}

/// A trigger-condition match for one screening type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionEvidence {
    /// Matched patient condition
    pub condition_id: String,
    /// Condition name as recorded on the chart
    pub condition_name: String,
    /// Display name of the trigger that matched
    pub trigger_display: String,
    /// Tier the match was made at
    pub tier: MatchTier,
    /// Tier confidence
    pub confidence: f64,
    /// Diagnosed date of the condition
    pub evidence_date: NaiveDate,
}

/// A keyword match of one document against one screening type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentEvidence {
    /// Matched document
    pub document_id: String,
    /// Keyword texts that hit, in catalog order
    pub matched_keywords: Vec<String>,
    /// Sum of matched keyword weights
    pub score: f64,
    /// score / total keyword weight, capped at 1.0
    pub confidence: f64,
    /// Clinical date of the document
    pub evidence_date: NaiveDate,
}

/// Best evidence for a screening type, from either source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Evidence {
    Condition(ConditionEvidence),
    Document(DocumentEvidence),
}

impl Evidence {
    pub fn kind(&self) -> EvidenceKind {
        match self {
            Evidence::Condition(_) => EvidenceKind::Condition,
            Evidence::Document(_) => EvidenceKind::Document,
        }
    }

    pub fn date(&self) -> NaiveDate {
        match self {
            Evidence::Condition(c) => c.evidence_date,
            Evidence::Document(d) => d.evidence_date,
        }
    }

    pub fn confidence(&self) -> f64 {
        match self {
            Evidence::Condition(c) => c.confidence,
            Evidence::Document(d) => d.confidence,
        }
    }

    /// Id of the condition or document behind this evidence.
    pub fn source_id(&self) -> &str {
        match self {
            Evidence::Condition(c) => &c.condition_id,
            Evidence::Document(d) => &d.document_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_confidence_ordering() {
        assert!(MatchTier::ExactCode.confidence() > MatchTier::CrossSystem.confidence());
        assert!(MatchTier::CrossSystem.confidence() > MatchTier::DisplayName.confidence());
    }

    #[test]
    fn test_evidence_accessors() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 10).unwrap();
        let ev = Evidence::Document(DocumentEvidence {
            document_id: "doc-1".into(),
            matched_keywords: vec!["mammogram".into()],
            score: 1.0,
            confidence: 0.5,
            evidence_date: date,
        });
        assert_eq!(ev.kind(), EvidenceKind::Document);
        assert_eq!(ev.date(), date);
        assert_eq!(ev.source_id(), "doc-1");
    }
}
