//! Tiered matching of patient conditions against trigger lists.
//!
//! Tiers, strongest first:
//! 1. Exact coded match: same system, same code.
//! 2. Cross-system match: the patient code translates to a trigger code
//!    through the crosswalk.
//! 3. Display-name fallback: normalized substring containment between the
//!    condition name and the trigger display, for uncoded and custom-coded
//!    conditions. Candidates within this tier are ranked by Jaro-Winkler
//!    similarity.
//!
//! Each tier carries a fixed confidence; similarity never inflates it.

use serde::Serialize;

use crate::models::{
    CodeSystem, ConditionEvidence, MatchTier, PatientCondition, ScreeningType, TriggerCondition,
};

use super::crosswalk::CodeCrosswalk;
use super::normalize::{normalize_code, normalize_display};

/// Match one patient condition against one screening type's trigger list.
/// Inactive conditions never match.
pub fn match_condition(
    ty: &ScreeningType,
    cond: &PatientCondition,
    crosswalk: &CodeCrosswalk,
) -> Option<ConditionEvidence> {
    if !cond.active {
        return None;
    }
    let (tier, trigger) = match_against_triggers(ty, cond.coding(), &cond.name, crosswalk)?;
    Some(ConditionEvidence {
        condition_id: cond.id.clone(),
        condition_name: cond.name.clone(),
        trigger_display: trigger.display.clone(),
        tier,
        confidence: tier.confidence(),
        evidence_date: cond.diagnosed_date,
    })
}

/// Tier resolution against a trigger list, shared by evaluation and the
/// admin probe. Returns the tier and the trigger that matched.
fn match_against_triggers<'a>(
    ty: &'a ScreeningType,
    coding: Option<(CodeSystem, &str)>,
    name: &str,
    crosswalk: &CodeCrosswalk,
) -> Option<(MatchTier, &'a TriggerCondition)> {
    if let Some((system, code)) = coding {
        let code = normalize_code(code);

        // Tier 1: exact coded match.
        if let Some(trigger) = ty
            .trigger_conditions
            .iter()
            .find(|t| t.system == system && normalize_code(&t.code) == code)
        {
            return Some((MatchTier::ExactCode, trigger));
        }

        // Tier 2: translate into each trigger's system.
        if let Some(trigger) = ty.trigger_conditions.iter().find(|t| {
            crosswalk
                .translate(system, &code, t.system)
                .is_some_and(|translated| normalize_code(&t.code) == translated)
        }) {
            return Some((MatchTier::CrossSystem, trigger));
        }
    }

    // Tier 3: display-name fallback.
    display_fallback(ty, name).map(|trigger| (MatchTier::DisplayName, trigger))
}

/// Pick the best display-name candidate: containment in either direction,
/// ranked by Jaro-Winkler similarity, trigger order breaking ties.
fn display_fallback<'a>(ty: &'a ScreeningType, name: &str) -> Option<&'a TriggerCondition> {
    let norm_name = normalize_display(name);
    if norm_name.is_empty() {
        return None;
    }

    let mut best: Option<(f64, &TriggerCondition)> = None;
    for trigger in &ty.trigger_conditions {
        let norm_display = normalize_display(&trigger.display);
        if norm_display.is_empty() {
            continue;
        }
        if !norm_name.contains(&norm_display) && !norm_display.contains(&norm_name) {
            continue;
        }
        let similarity = strsim::jaro_winkler(&norm_name, &norm_display);
        // Strictly-greater keeps the earliest trigger on ties.
        if best.map(|(s, _)| similarity > s).unwrap_or(true) {
            best = Some((similarity, trigger));
        }
    }
    best.map(|(_, trigger)| trigger)
}

/// One screening type matched by the admin condition probe.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConditionMatchPreview {
    pub screening_type_id: String,
    pub screening_type_name: String,
    pub tier: MatchTier,
    pub confidence: f64,
    pub trigger_display: String,
}

/// Admin probe: which active screening types would this (system, code,
/// display) triple trigger? Ranked by confidence, then name.
pub fn match_screening_types<'a, I>(
    types: I,
    crosswalk: &CodeCrosswalk,
    system: Option<CodeSystem>,
    code: Option<&str>,
    display: Option<&str>,
) -> Vec<ConditionMatchPreview>
where
    I: IntoIterator<Item = &'a ScreeningType>,
{
    let coding = match (system, code) {
        (Some(system), Some(code)) => Some((system, code)),
        _ => None,
    };
    let name = display.unwrap_or_default();

    let mut matches: Vec<ConditionMatchPreview> = types
        .into_iter()
        .filter_map(|ty| {
            match_against_triggers(ty, coding, name, crosswalk).map(|(tier, trigger)| {
                ConditionMatchPreview {
                    screening_type_id: ty.id.clone(),
                    screening_type_name: ty.name.clone(),
                    tier,
                    confidence: tier.confidence(),
                    trigger_display: trigger.display.clone(),
                }
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.screening_type_name.cmp(&b.screening_type_name))
    });
    matches
}
