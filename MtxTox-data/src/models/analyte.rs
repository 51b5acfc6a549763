use std::fmt;

use serde::{Deserialize, Serialize};

/// Laboratory analyte identified by its NPU/DNK code
///
/// Codes the diagnosis catalog knows about get their own variant; anything
/// else found in a dataset is kept as `Other` so it can still be stored and
/// plotted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AnalyteCode {
    /// NPU02902 - neutrophilocytes in blood
    Neutrophils,

    /// NPU19748 - C-reactive protein in plasma
    CReactiveProtein,

    /// NPU19651 - alanine transaminase in plasma
    AlanineTransaminase,

    /// NPU01684 - coagulation factors II+VII+X, relative activity
    CoagulationFactors,

    /// NPU01370 - bilirubin in plasma
    Bilirubin,

    /// NPU18016 - creatinine in plasma
    Creatinine,

    /// NPU03568 - thrombocytes in blood
    Platelets,

    /// NPU19652 - amylase in plasma
    Amylase,

    /// NPU19653 - pancreatic amylase in plasma
    PancreaticAmylase,

    /// DNK05451 - lipase in plasma
    Lipase,

    /// Any code without a dedicated variant
    Other(String),
}

impl AnalyteCode {
    /// The laboratory code as it appears in the dataset
    pub fn code(&self) -> &str {
        match self {
            AnalyteCode::Neutrophils => "NPU02902",
            AnalyteCode::CReactiveProtein => "NPU19748",
            AnalyteCode::AlanineTransaminase => "NPU19651",
            AnalyteCode::CoagulationFactors => "NPU01684",
            AnalyteCode::Bilirubin => "NPU01370",
            AnalyteCode::Creatinine => "NPU18016",
            AnalyteCode::Platelets => "NPU03568",
            AnalyteCode::Amylase => "NPU19652",
            AnalyteCode::PancreaticAmylase => "NPU19653",
            AnalyteCode::Lipase => "DNK05451",
            AnalyteCode::Other(code) => code,
        }
    }

    /// Parse a laboratory code, falling back to `Other` for unknown codes
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_uppercase().as_str() {
            "NPU02902" => AnalyteCode::Neutrophils,
            "NPU19748" => AnalyteCode::CReactiveProtein,
            "NPU19651" => AnalyteCode::AlanineTransaminase,
            "NPU01684" => AnalyteCode::CoagulationFactors,
            "NPU01370" => AnalyteCode::Bilirubin,
            "NPU18016" => AnalyteCode::Creatinine,
            "NPU03568" => AnalyteCode::Platelets,
            "NPU19652" => AnalyteCode::Amylase,
            "NPU19653" => AnalyteCode::PancreaticAmylase,
            "DNK05451" => AnalyteCode::Lipase,
            _ => AnalyteCode::Other(code.trim().to_string()),
        }
    }

    /// Human readable name
    pub fn label(&self) -> &str {
        match self {
            AnalyteCode::Neutrophils => "Neutrophils",
            AnalyteCode::CReactiveProtein => "C-reactive protein",
            AnalyteCode::AlanineTransaminase => "Alanine transaminase",
            AnalyteCode::CoagulationFactors => "Coagulation factors II+VII+X",
            AnalyteCode::Bilirubin => "Bilirubin",
            AnalyteCode::Creatinine => "Creatinine",
            AnalyteCode::Platelets => "Platelets",
            AnalyteCode::Amylase => "Amylase",
            AnalyteCode::PancreaticAmylase => "Pancreatic amylase",
            AnalyteCode::Lipase => "Lipase",
            AnalyteCode::Other(code) => code,
        }
    }

    /// Unit every value of this analyte must already be expressed in.
    /// `None` for codes without a dedicated variant.
    pub fn canonical_unit(&self) -> Option<Unit> {
        match self {
            AnalyteCode::Neutrophils | AnalyteCode::Platelets => Some(Unit::GigaPerLitre),
            AnalyteCode::CReactiveProtein => Some(Unit::MilligramPerLitre),
            AnalyteCode::AlanineTransaminase
            | AnalyteCode::Amylase
            | AnalyteCode::PancreaticAmylase
            | AnalyteCode::Lipase => Some(Unit::UnitsPerLitre),
            AnalyteCode::Bilirubin | AnalyteCode::Creatinine => Some(Unit::MicromolePerLitre),
            AnalyteCode::CoagulationFactors => Some(Unit::Ratio),
            AnalyteCode::Other(_) => None,
        }
    }
}

impl fmt::Display for AnalyteCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl From<String> for AnalyteCode {
    fn from(code: String) -> Self {
        AnalyteCode::from_code(&code)
    }
}

impl From<&str> for AnalyteCode {
    fn from(code: &str) -> Self {
        AnalyteCode::from_code(code)
    }
}

impl From<AnalyteCode> for String {
    fn from(code: AnalyteCode) -> Self {
        code.code().to_string()
    }
}

/// Measurement unit tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Unit {
    /// x10^9 cells per litre
    GigaPerLitre,

    /// Milligrams per litre
    MilligramPerLitre,

    /// Enzyme units per litre
    UnitsPerLitre,

    /// Micromoles per litre
    MicromolePerLitre,

    /// Dimensionless ratio
    Ratio,

    /// Unrecognised unit, kept verbatim
    Other(String),
}

impl Unit {
    /// Canonical spelling of the unit
    pub fn symbol(&self) -> &str {
        match self {
            Unit::GigaPerLitre => "10^9/L",
            Unit::MilligramPerLitre => "mg/L",
            Unit::UnitsPerLitre => "U/L",
            Unit::MicromolePerLitre => "umol/L",
            Unit::Ratio => "1",
            Unit::Other(symbol) => symbol,
        }
    }

    /// Parse a unit symbol, accepting the spellings found in lab exports
    pub fn parse(symbol: &str) -> Self {
        let normalized = symbol.trim().replace(' ', "");
        match normalized.to_lowercase().as_str() {
            "10^9/l" | "x10^9/l" | "×10^9/l" | "10e9/l" | "10*9/l" => Unit::GigaPerLitre,
            "mg/l" => Unit::MilligramPerLitre,
            "u/l" | "iu/l" => Unit::UnitsPerLitre,
            "umol/l" | "µmol/l" | "μmol/l" => Unit::MicromolePerLitre,
            "1" | "ratio" => Unit::Ratio,
            _ => Unit::Other(symbol.trim().to_string()),
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl From<String> for Unit {
    fn from(symbol: String) -> Self {
        Unit::parse(&symbol)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.symbol().to_string()
    }
}
