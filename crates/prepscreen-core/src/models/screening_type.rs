//! Screening type catalog models.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// A preventive-care screening type (e.g. mammogram, colonoscopy).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreeningType {
    /// Unique identifier
    pub id: String,
    /// Human-facing name, unique within the catalog
    pub name: String,
    /// Optional description shown to admins
    pub description: Option<String>,
    /// How often the screening recurs
    pub frequency: Frequency,
    /// Minimum patient age in years (inclusive)
    pub min_age: Option<u32>,
    /// Maximum patient age in years (inclusive)
    pub max_age: Option<u32>,
    /// Gender restriction (None = applies to all)
    pub gender: Option<Gender>,
    /// Keywords for document matching, in admin-defined order
    pub keywords: Vec<Keyword>,
    /// Coded conditions that make this screening applicable
    pub trigger_conditions: Vec<TriggerCondition>,
    /// Whether this type participates in evaluation
    pub active: bool,
    /// Creation timestamp (RFC3339)
    pub created_at: String,
    /// Last update timestamp (RFC3339)
    pub updated_at: String,
}

/// Recurrence interval for a screening type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Frequency {
    /// Number of units between completions
    pub count: u32,
    /// Unit of the interval
    pub unit: FrequencyUnit,
}

/// Unit for screening frequency.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Days,
    Weeks,
    Months,
    Years,
}

/// Patient gender as used for screening restrictions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

/// A weighted keyword owned by one screening type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Keyword {
    /// Text to look for in document content and filenames
    pub text: String,
    /// Contribution to the match score
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Whether matching respects letter case
    #[serde(default)]
    pub case_sensitive: bool,
    /// Whether the text must appear on token boundaries
    #[serde(default)]
    pub exact_match: bool,
    /// Optional admin note
    #[serde(default)]
    pub description: Option<String>,
}

fn default_weight() -> f64 {
    1.0
}

/// A coded condition that triggers a screening type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerCondition {
    /// Coding system the code belongs to
    pub system: CodeSystem,
    /// Code within the system (e.g. "E11.9")
    pub code: String,
    /// Human-readable display name
    pub display: String,
}

/// Supported clinical coding systems.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CodeSystem {
    Snomed,
    #[serde(rename = "icd10cm")]
    Icd10Cm,
    #[serde(rename = "icd9cm")]
    Icd9Cm,
    Custom,
}

impl CodeSystem {
    /// Canonical string form for storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            CodeSystem::Snomed => "snomed",
            CodeSystem::Icd10Cm => "icd10cm",
            CodeSystem::Icd9Cm => "icd9cm",
            CodeSystem::Custom => "custom",
        }
    }

    /// Parse a system name, tolerating common spellings ("ICD-10-CM", "icd10").
    pub fn parse(s: &str) -> Option<CodeSystem> {
        let folded: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match folded.as_str() {
            "snomed" | "snomedct" | "sct" => Some(CodeSystem::Snomed),
            "icd10" | "icd10cm" => Some(CodeSystem::Icd10Cm),
            "icd9" | "icd9cm" => Some(CodeSystem::Icd9Cm),
            "custom" | "local" => Some(CodeSystem::Custom),
            _ => None,
        }
    }
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    pub fn parse(s: &str) -> Option<Gender> {
        match s.to_ascii_lowercase().as_str() {
            "male" | "m" => Some(Gender::Male),
            "female" | "f" => Some(Gender::Female),
            _ => None,
        }
    }
}

impl FrequencyUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyUnit::Days => "days",
            FrequencyUnit::Weeks => "weeks",
            FrequencyUnit::Months => "months",
            FrequencyUnit::Years => "years",
        }
    }

    pub fn parse(s: &str) -> Option<FrequencyUnit> {
        match s.to_ascii_lowercase().as_str() {
            "days" | "day" => Some(FrequencyUnit::Days),
            "weeks" | "week" => Some(FrequencyUnit::Weeks),
            "months" | "month" => Some(FrequencyUnit::Months),
            "years" | "year" => Some(FrequencyUnit::Years),
            _ => None,
        }
    }
}

impl Frequency {
    /// Date the screening is next due after a completion on `from`.
    ///
    /// Days and weeks add exact day counts. Months and years use calendar
    /// addition with end-of-month clamping (Jan 31 + 1 month = Feb 28/29),
    /// so a yearly screening completed on a leap day stays anchored to
    /// the calendar instead of drifting.
    pub fn next_due(&self, from: NaiveDate) -> NaiveDate {
        let result = match self.unit {
            FrequencyUnit::Days => from.checked_add_signed(chrono::Duration::days(self.count as i64)),
            FrequencyUnit::Weeks => {
                from.checked_add_signed(chrono::Duration::weeks(self.count as i64))
            }
            FrequencyUnit::Months => from.checked_add_months(Months::new(self.count)),
            FrequencyUnit::Years => {
                from.checked_add_months(Months::new(self.count.saturating_mul(12)))
            }
        };
        result.unwrap_or(NaiveDate::MAX)
    }
}

impl Keyword {
    /// Create a keyword with default weight and flags.
    pub fn new(text: String) -> Self {
        Self {
            text,
            weight: 1.0,
            case_sensitive: false,
            exact_match: false,
            description: None,
        }
    }
}

impl ScreeningType {
    /// Create a new screening type with required fields.
    pub fn new(name: String, frequency: Frequency) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            description: None,
            frequency,
            min_age: None,
            max_age: None,
            gender: None,
            keywords: Vec::new(),
            trigger_conditions: Vec::new(),
            active: true,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Check the age restriction against a possibly unknown age.
    ///
    /// An unknown age fails any age bound present: a patient with no
    /// recorded age is never recommended an age-restricted screening.
    pub fn matches_age(&self, age: Option<u32>) -> bool {
        if self.min_age.is_none() && self.max_age.is_none() {
            return true;
        }
        let Some(age) = age else {
            return false;
        };
        if let Some(min) = self.min_age {
            if age < min {
                return false;
            }
        }
        if let Some(max) = self.max_age {
            if age > max {
                return false;
            }
        }
        true
    }

    /// Check the gender restriction against a possibly unknown gender.
    pub fn matches_gender(&self, gender: Option<Gender>) -> bool {
        match self.gender {
            None => true,
            Some(required) => gender == Some(required),
        }
    }

    /// Sum of all keyword weights, the denominator for match confidence.
    pub fn total_keyword_weight(&self) -> f64 {
        self.keywords.iter().map(|k| k.weight).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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
    fn test_age_bounds() {
        let mut ty = make_type("Mammogram");
        ty.min_age = Some(40);
        ty.max_age = Some(74);

        assert!(ty.matches_age(Some(40)));
        assert!(ty.matches_age(Some(74)));
        assert!(ty.matches_age(Some(50)));
        assert!(!ty.matches_age(Some(39)));
        assert!(!ty.matches_age(Some(75)));
    }

    #[test]
    fn test_unknown_age_fails_bounds() {
        let mut ty = make_type("Mammogram");
        ty.min_age = Some(40);
        assert!(!ty.matches_age(None));

        let unrestricted = make_type("Blood Pressure");
        assert!(unrestricted.matches_age(None));
        assert!(unrestricted.matches_age(Some(8)));
    }

    #[test]
    fn test_gender_restriction() {
        let mut ty = make_type("Mammogram");
        ty.gender = Some(Gender::Female);

        assert!(ty.matches_gender(Some(Gender::Female)));
        assert!(!ty.matches_gender(Some(Gender::Male)));
        assert!(!ty.matches_gender(None));

        let unrestricted = make_type("Colonoscopy");
        assert!(unrestricted.matches_gender(None));
        assert!(unrestricted.matches_gender(Some(Gender::Male)));
    }

    #[test]
    fn test_next_due_calendar_months() {
        let freq = Frequency {
            count: 1,
            unit: FrequencyUnit::Months,
        };
        let jan31 = NaiveDate::from_ymd_opt(2025, 1, 31).unwrap();
        assert_eq!(
            freq.next_due(jan31),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );

        // Leap year clamps to Feb 29
        let jan31_leap = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            freq.next_due(jan31_leap),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_next_due_years_from_leap_day() {
        let freq = Frequency {
            count: 1,
            unit: FrequencyUnit::Years,
        };
        let leap_day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(
            freq.next_due(leap_day),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
    }

    #[test]
    fn test_next_due_days_and_weeks() {
        let days = Frequency {
            count: 90,
            unit: FrequencyUnit::Days,
        };
        let weeks = Frequency {
            count: 2,
            unit: FrequencyUnit::Weeks,
        };
        let from = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        assert_eq!(
            days.next_due(from),
            NaiveDate::from_ymd_opt(2025, 5, 30).unwrap()
        );
        assert_eq!(
            weeks.next_due(from),
            NaiveDate::from_ymd_opt(2025, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_total_keyword_weight() {
        let mut ty = make_type("Colonoscopy");
        ty.keywords.push(Keyword::new("colonoscopy".into()));
        let mut second = Keyword::new("polyp".into());
        second.weight = 0.5;
        ty.keywords.push(second);

        assert!((ty.total_keyword_weight() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_code_system_parse() {
        assert_eq!(CodeSystem::parse("ICD-10-CM"), Some(CodeSystem::Icd10Cm));
        assert_eq!(CodeSystem::parse("icd10"), Some(CodeSystem::Icd10Cm));
        assert_eq!(CodeSystem::parse("SNOMED CT"), Some(CodeSystem::Snomed));
        assert_eq!(CodeSystem::parse("icd-9-cm"), Some(CodeSystem::Icd9Cm));
        assert_eq!(CodeSystem::parse("loinc"), None);
    }
}
