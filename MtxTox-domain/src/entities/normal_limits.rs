use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use mtx_tox_data::{AnalyteCode, Unit};

/// Fixed upper reference value of an analyte
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalLimit {
    pub value: f64,
    pub unit: Unit,
}

/// Normal limits used by limit-relative rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalLimits(BTreeMap<AnalyteCode, NormalLimit>);

impl NormalLimits {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, analyte: AnalyteCode, value: f64, unit: Unit) -> Self {
        self.0.insert(analyte, NormalLimit { value, unit });
        self
    }

    pub fn get(&self, analyte: &AnalyteCode) -> Option<&NormalLimit> {
        self.0.get(analyte)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AnalyteCode, &NormalLimit)> {
        self.0.iter()
    }
}

impl Default for NormalLimits {
    fn default() -> Self {
        Self::empty()
            .with(AnalyteCode::Amylase, 120.0, Unit::UnitsPerLitre)
            .with(AnalyteCode::PancreaticAmylase, 36.0, Unit::UnitsPerLitre)
            .with(AnalyteCode::Lipase, 190.0, Unit::UnitsPerLitre)
            .with(AnalyteCode::CReactiveProtein, 100.0, Unit::MilligramPerLitre)
    }
}
