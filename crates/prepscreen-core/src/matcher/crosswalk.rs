//! Cross-system code translation table.
//!
//! Maps equivalent codes across SNOMED CT, ICD-10-CM and ICD-9-CM for the
//! chronic conditions that drive preventive screenings. Entries are curated,
//! not exhaustive; a miss here just means the crosswalk tier cannot match.
//! Custom codes are never translated.

use std::collections::HashMap;

use crate::models::CodeSystem;

use super::normalize::normalize_code;

/// In-memory crosswalk between clinical coding systems.
pub struct CodeCrosswalk {
    /// (system, normalized code) -> index into `concepts`
    lookup: HashMap<(CodeSystem, String), usize>,
    /// Each concept is the set of codes that mean the same thing
    concepts: Vec<Vec<(CodeSystem, String)>>,
}

impl Default for CodeCrosswalk {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeCrosswalk {
    /// Create a crosswalk seeded with the default concept set.
    pub fn new() -> Self {
        let mut walk = Self::empty();
        walk.seed();
        walk
    }

    /// Create an empty crosswalk.
    pub fn empty() -> Self {
        Self {
            lookup: HashMap::new(),
            concepts: Vec::new(),
        }
    }

    /// Register one concept: a set of codes that all mean the same thing.
    /// Custom-system entries are ignored.
    pub fn add_mapping(&mut self, codes: &[(CodeSystem, &str)]) {
        let normalized: Vec<(CodeSystem, String)> = codes
            .iter()
            .filter(|(system, _)| *system != CodeSystem::Custom)
            .map(|(system, code)| (*system, normalize_code(code)))
            .collect();
        if normalized.len() < 2 {
            return;
        }
        let index = self.concepts.len();
        for (system, code) in &normalized {
            self.lookup.insert((*system, code.clone()), index);
        }
        self.concepts.push(normalized);
    }

    /// Translate a code from one system to another. Returns the normalized
    /// target code, or None when the concept or target system is unknown.
    pub fn translate(&self, from: CodeSystem, code: &str, to: CodeSystem) -> Option<String> {
        if from == CodeSystem::Custom || to == CodeSystem::Custom || from == to {
            return None;
        }
        let index = *self.lookup.get(&(from, normalize_code(code)))?;
        self.concepts[index]
            .iter()
            .find(|(system, _)| *system == to)
            .map(|(_, code)| code.clone())
    }

    /// Number of concepts in the table.
    pub fn len(&self) -> usize {
        self.concepts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.concepts.is_empty()
    }

    /// Default concept set.
    fn seed(&mut self) {
        use CodeSystem::{Icd10Cm, Icd9Cm, Snomed};

        // Cardiometabolic
        self.add_mapping(&[
            (Snomed, "44054006"),
            (Icd10Cm, "E11.9"),
            (Icd9Cm, "250.00"),
        ]); // type 2 diabetes mellitus
        self.add_mapping(&[(Snomed, "59621000"), (Icd10Cm, "I10"), (Icd9Cm, "401.9")]); // essential hypertension
        self.add_mapping(&[(Snomed, "55822004"), (Icd10Cm, "E78.5"), (Icd9Cm, "272.4")]); // hyperlipidemia
        self.add_mapping(&[
            (Snomed, "414916001"),
            (Icd10Cm, "E66.9"),
            (Icd9Cm, "278.00"),
        ]); // obesity
        self.add_mapping(&[
            (Snomed, "53741008"),
            (Icd10Cm, "I25.10"),
            (Icd9Cm, "414.01"),
        ]); // coronary artery disease
        self.add_mapping(&[
            (Snomed, "49436004"),
            (Icd10Cm, "I48.91"),
            (Icd9Cm, "427.31"),
        ]); // atrial fibrillation

        // Respiratory
        self.add_mapping(&[(Snomed, "13645005"), (Icd10Cm, "J44.9"), (Icd9Cm, "496")]); // COPD
        self.add_mapping(&[
            (Snomed, "56294008"),
            (Icd10Cm, "F17.200"),
            (Icd9Cm, "305.1"),
        ]); // nicotine dependence

        // Renal / hepatic
        self.add_mapping(&[
            (Snomed, "709044004"),
            (Icd10Cm, "N18.9"),
            (Icd9Cm, "585.9"),
        ]); // chronic kidney disease
        self.add_mapping(&[
            (Snomed, "128302006"),
            (Icd10Cm, "B18.2"),
            (Icd9Cm, "070.54"),
        ]); // chronic hepatitis C

        // Bone / behavioral
        self.add_mapping(&[
            (Snomed, "64859006"),
            (Icd10Cm, "M81.0"),
            (Icd9Cm, "733.00"),
        ]); // osteoporosis
        self.add_mapping(&[(Snomed, "370143000"), (Icd10Cm, "F32.9"), (Icd9Cm, "311")]); // major depressive disorder

        // Family history
        self.add_mapping(&[(Icd10Cm, "Z80.0"), (Icd9Cm, "V16.0")]); // family history of digestive-organ cancer
    }
}
