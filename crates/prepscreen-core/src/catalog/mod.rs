//! Validated screening type catalog.
//!
//! All configuration validation happens here, at load time. Evaluation
//! assumes every type it sees is well formed and never re-checks.

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::models::{CodeSystem, Frequency, Gender, Keyword, ScreeningType, TriggerCondition};

/// Catalog configuration errors.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("screening type name must not be empty (id {id})")]
    EmptyName { id: String },

    #[error("duplicate screening type name '{name}'")]
    DuplicateName { name: String },

    #[error("screening type '{name}': min_age {min} exceeds max_age {max}")]
    InvalidAgeRange { name: String, min: u32, max: u32 },

    #[error("screening type '{name}': frequency count must be at least 1")]
    ZeroFrequency { name: String },

    #[error("screening type '{name}': keyword text must not be empty")]
    EmptyKeyword { name: String },

    #[error("screening type '{name}': keyword '{keyword}' has invalid weight {weight}")]
    InvalidKeywordWeight {
        name: String,
        keyword: String,
        weight: f64,
    },

    #[error("screening type '{name}': trigger condition has an empty code")]
    EmptyTriggerCode { name: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// An immutable, validated set of screening types, ordered by name.
///
/// Holds inactive types too so reconciliation can distinguish a
/// deactivated type from one that was deleted outright.
#[derive(Debug, Clone)]
pub struct ScreeningTypeCatalog {
    types: Vec<ScreeningType>,
}

impl ScreeningTypeCatalog {
    /// Validate and build a catalog. Rejects bad configuration; logs a
    /// data-quality warning for duplicate trigger codes within a type.
    pub fn new(mut types: Vec<ScreeningType>) -> CatalogResult<Self> {
        for ty in &types {
            validate_type(ty)?;
        }

        let mut seen: Vec<String> = Vec::with_capacity(types.len());
        for ty in &types {
            let folded = ty.name.to_lowercase();
            if seen.contains(&folded) {
                return Err(CatalogError::DuplicateName {
                    name: ty.name.clone(),
                });
            }
            seen.push(folded);
        }

        types.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(Self { types })
    }

    /// An empty catalog.
    pub fn empty() -> Self {
        Self { types: Vec::new() }
    }

    /// All types, active and inactive, in name order.
    pub fn iter(&self) -> impl Iterator<Item = &ScreeningType> {
        self.types.iter()
    }

    /// Active types in name order.
    pub fn active(&self) -> impl Iterator<Item = &ScreeningType> {
        self.types.iter().filter(|t| t.active)
    }

    /// Look up a type by id.
    pub fn get(&self, id: &str) -> Option<&ScreeningType> {
        self.types.iter().find(|t| t.id == id)
    }

    /// Look up a type by exact name.
    pub fn get_by_name(&self, name: &str) -> Option<&ScreeningType> {
        self.types.iter().find(|t| t.name == name)
    }

    /// Whether an active type with this id exists.
    pub fn contains_active(&self, id: &str) -> bool {
        self.get(id).map(|t| t.active).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Validate one definition in isolation. Catalog construction also runs
/// this, plus duplicate-name detection across the set.
pub fn validate_type(ty: &ScreeningType) -> CatalogResult<()> {
    if ty.name.trim().is_empty() {
        return Err(CatalogError::EmptyName { id: ty.id.clone() });
    }
    if let (Some(min), Some(max)) = (ty.min_age, ty.max_age) {
        if min > max {
            return Err(CatalogError::InvalidAgeRange {
                name: ty.name.clone(),
                min,
                max,
            });
        }
    }
    if ty.frequency.count == 0 {
        return Err(CatalogError::ZeroFrequency {
            name: ty.name.clone(),
        });
    }
    for kw in &ty.keywords {
        if kw.text.trim().is_empty() {
            return Err(CatalogError::EmptyKeyword {
                name: ty.name.clone(),
            });
        }
        if !kw.weight.is_finite() || kw.weight <= 0.0 {
            return Err(CatalogError::InvalidKeywordWeight {
                name: ty.name.clone(),
                keyword: kw.text.clone(),
                weight: kw.weight,
            });
        }
    }
    for trigger in &ty.trigger_conditions {
        if trigger.code.trim().is_empty() {
            return Err(CatalogError::EmptyTriggerCode {
                name: ty.name.clone(),
            });
        }
    }

    // Duplicate codes in one trigger list are tolerated but worth flagging.
    for (i, a) in ty.trigger_conditions.iter().enumerate() {
        for b in ty.trigger_conditions.iter().skip(i + 1) {
            if a.system == b.system && a.code.eq_ignore_ascii_case(&b.code) {
                warn!(
                    screening_type = %ty.name,
                    system = a.system.as_str(),
                    code = %a.code,
                    "duplicate trigger condition in catalog"
                );
            }
        }
    }
    Ok(())
}

/// A screening type as written in an admin catalog file. Ids and
/// timestamps are optional; missing ids are generated on import.
#[derive(Debug, Deserialize)]
pub struct ScreeningTypeDef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub frequency: Frequency,
    #[serde(default)]
    pub min_age: Option<u32>,
    #[serde(default)]
    pub max_age: Option<u32>,
    #[serde(default)]
    pub gender: Option<Gender>,
    #[serde(default)]
    pub keywords: Vec<Keyword>,
    #[serde(default)]
    pub trigger_conditions: Vec<TriggerCondition>,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl From<ScreeningTypeDef> for ScreeningType {
    fn from(def: ScreeningTypeDef) -> Self {
        let mut ty = ScreeningType::new(def.name, def.frequency);
        if let Some(id) = def.id {
            ty.id = id;
        }
        ty.description = def.description;
        ty.min_age = def.min_age;
        ty.max_age = def.max_age;
        ty.gender = def.gender;
        ty.keywords = def.keywords;
        ty.trigger_conditions = def.trigger_conditions;
        ty.active = def.active;
        ty
    }
}

/// Parse and validate a JSON array of screening type definitions.
pub fn from_json(json: &str) -> CatalogResult<Vec<ScreeningType>> {
    let defs: Vec<ScreeningTypeDef> = serde_json::from_str(json)?;
    let types: Vec<ScreeningType> = defs.into_iter().map(Into::into).collect();
    // Run full validation, including duplicate-name detection.
    let catalog = ScreeningTypeCatalog::new(types)?;
    Ok(catalog.types)
}

/// A trigger condition literal, for building catalogs in code and tests.
pub fn trigger(system: CodeSystem, code: &str, display: &str) -> TriggerCondition {
    TriggerCondition {
        system,
        code: code.to_string(),
        display: display.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FrequencyUnit;

    fn make_type(name: &str) -> ScreeningType {
        ScreeningType::new(
            name.into(),
            Frequency {
                count: 1,
                unit: FrequencyUnit::Years,
            },
        )
    }

    #[test]
    fn test_catalog_sorted_by_name() {
        let catalog = ScreeningTypeCatalog::new(vec![
            make_type("Mammogram"),
            make_type("A1c Test"),
            make_type("Colonoscopy"),
        ])
        .unwrap();

        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["A1c Test", "Colonoscopy", "Mammogram"]);
    }

    #[test]
    fn test_inverted_age_range_rejected() {
        let mut ty = make_type("Mammogram");
        ty.min_age = Some(74);
        ty.max_age = Some(40);

        let err = ScreeningTypeCatalog::new(vec![ty]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidAgeRange { .. }));
    }

    #[test]
    fn test_zero_frequency_rejected() {
        let mut ty = make_type("Mammogram");
        ty.frequency.count = 0;

        let err = ScreeningTypeCatalog::new(vec![ty]).unwrap_err();
        assert!(matches!(err, CatalogError::ZeroFrequency { .. }));
    }

    #[test]
    fn test_bad_keywords_rejected() {
        let mut ty = make_type("Mammogram");
        ty.keywords.push(Keyword::new("   ".into()));
        let err = ScreeningTypeCatalog::new(vec![ty]).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyKeyword { .. }));

        let mut ty = make_type("Mammogram");
        let mut kw = Keyword::new("mammogram".into());
        kw.weight = 0.0;
        ty.keywords.push(kw);
        let err = ScreeningTypeCatalog::new(vec![ty]).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidKeywordWeight { .. }));
    }

    #[test]
    fn test_duplicate_name_rejected_case_insensitive() {
        let err =
            ScreeningTypeCatalog::new(vec![make_type("Mammogram"), make_type("mammogram")])
                .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateName { .. }));
    }

    #[test]
    fn test_inactive_types_kept_but_filtered() {
        let mut inactive = make_type("Mammogram");
        inactive.active = false;
        let catalog =
            ScreeningTypeCatalog::new(vec![inactive, make_type("Colonoscopy")]).unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.active().count(), 1);
        assert!(!catalog.contains_active(catalog.get_by_name("Mammogram").unwrap().id.as_str()));
    }

    #[test]
    fn test_from_json_defaults() {
        let json = r#"[
            {
                "name": "Mammogram",
                "frequency": { "count": 1, "unit": "years" },
                "min_age": 40,
                "gender": "female",
                "keywords": [
                    { "text": "mammogram" },
                    { "text": "breast imaging", "weight": 0.8 }
                ]
            }
        ]"#;

        let types = from_json(json).unwrap();
        assert_eq!(types.len(), 1);
        let ty = &types[0];
        assert!(!ty.id.is_empty());
        assert!(ty.active);
        assert_eq!(ty.keywords[0].weight, 1.0);
        assert!(!ty.keywords[0].exact_match);
        assert_eq!(ty.gender, Some(Gender::Female));
    }

    #[test]
    fn test_from_json_rejects_bad_config() {
        let json = r#"[
            {
                "name": "Mammogram",
                "frequency": { "count": 0, "unit": "years" }
            }
        ]"#;
        assert!(matches!(
            from_json(json),
            Err(CatalogError::ZeroFrequency { .. })
        ));
    }
}
