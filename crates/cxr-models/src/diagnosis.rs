//! Diagnosis label table.
//!
//! The order of [`Diagnosis::ALL`] is the order of the classifier's output
//! vector. It is co-versioned with the model artifact: the lifecycle manager
//! rejects an artifact whose output width differs from `Diagnosis::COUNT`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Diagnostic category predicted by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum Diagnosis {
    /// General abnormalities in the lung fields
    #[serde(rename = "Lung_Opacity")]
    LungOpacity,
    /// Healthy lungs
    #[serde(rename = "Normal")]
    Normal,
    /// Findings consistent with pneumonia
    #[serde(rename = "Pneumonia")]
    Pneumonia,
}

impl Diagnosis {
    /// All labels, index-aligned with the model output vector.
    pub const ALL: [Diagnosis; 3] = [
        Diagnosis::LungOpacity,
        Diagnosis::Normal,
        Diagnosis::Pneumonia,
    ];

    /// Number of classes the model must output.
    pub const COUNT: usize = Self::ALL.len();

    /// Label at a model output index.
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Model output index of this label.
    pub fn index(&self) -> usize {
        match self {
            Diagnosis::LungOpacity => 0,
            Diagnosis::Normal => 1,
            Diagnosis::Pneumonia => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Diagnosis::LungOpacity => "Lung_Opacity",
            Diagnosis::Normal => "Normal",
            Diagnosis::Pneumonia => "Pneumonia",
        }
    }

    /// Label names in output order.
    pub fn labels() -> Vec<&'static str> {
        Self::ALL.iter().map(Diagnosis::as_str).collect()
    }
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Diagnosis {
    type Err = DiagnosisParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(' ', "_").as_str() {
            "lung_opacity" => Ok(Diagnosis::LungOpacity),
            "normal" => Ok(Diagnosis::Normal),
            "pneumonia" => Ok(Diagnosis::Pneumonia),
            _ => Err(DiagnosisParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown diagnosis label: {0}")]
pub struct DiagnosisParseError(String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_order_matches_table() {
        for (i, label) in Diagnosis::ALL.iter().enumerate() {
            assert_eq!(label.index(), i);
            assert_eq!(Diagnosis::from_index(i), Some(*label));
        }
        assert_eq!(Diagnosis::from_index(Diagnosis::COUNT), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(Diagnosis::labels(), vec!["Lung_Opacity", "Normal", "Pneumonia"]);
    }

    #[test]
    fn test_serde_uses_label_names() {
        let json = serde_json::to_string(&Diagnosis::LungOpacity).unwrap();
        assert_eq!(json, "\"Lung_Opacity\"");
        let parsed: Diagnosis = serde_json::from_str("\"Pneumonia\"").unwrap();
        assert_eq!(parsed, Diagnosis::Pneumonia);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Normal".parse::<Diagnosis>().unwrap(), Diagnosis::Normal);
        assert_eq!("lung opacity".parse::<Diagnosis>().unwrap(), Diagnosis::LungOpacity);
        assert!("covid".parse::<Diagnosis>().is_err());
    }
}
