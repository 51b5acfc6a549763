use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use mtx_tox_data::AnalyteCode;

use crate::errors::DiagnosisError;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Adjustable bounds and durations for every built-in diagnosis
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct RuleParameters {
    #[validate]
    pub neutropenia: NeutropeniaParameters,

    #[validate]
    pub severe_infection: SevereInfectionParameters,

    #[validate]
    pub hepatic: HepaticParameters,

    #[validate]
    pub renal: RenalParameters,

    #[validate]
    pub thrombocytopenia: ThrombocytopeniaParameters,

    #[validate]
    pub pancreatitis: PancreatitisParameters,
}

/// Neutrophils (NPU02902) below a bound for a number of days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct NeutropeniaParameters {
    /// x10^9/L
    #[validate(range(min = 0.0, max = 10.0, message = "Neutrophil bound must be between 0 and 10"))]
    pub concentration_bound: f64,

    #[validate(range(min = 0, max = 30, message = "Neutropenia duration must be between 0 and 30 days"))]
    pub min_days: u32,
}

impl Default for NeutropeniaParameters {
    fn default() -> Self {
        Self {
            concentration_bound: 0.5,
            min_days: 10,
        }
    }
}

/// CRP (NPU19748) above a bound, or above the reference limit for a number of days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct SevereInfectionParameters {
    /// mg/L
    #[validate(range(min = 0.0, max = 400.0, message = "CRP bound must be between 0 and 400"))]
    pub crp_bound: f64,

    /// mg/L, the reference upper limit of CRP
    #[validate(range(min = 0.0, max = 400.0, message = "Elevated CRP bound must be between 0 and 400"))]
    pub elevated_bound: f64,

    #[validate(range(min = 0, max = 180, message = "Elevated CRP duration must be between 0 and 180 days"))]
    pub elevated_days: u32,
}

impl Default for SevereInfectionParameters {
    fn default() -> Self {
        Self {
            crp_bound: 100.0,
            elevated_bound: 8.0,
            elevated_days: 7,
        }
    }
}

/// ALT (NPU19651) above a bound while coagulation factors (NPU01684) are low
/// or bilirubin (NPU01370) is high
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct HepaticParameters {
    /// U/L
    #[validate(range(min = 0.0, max = 100.0, message = "ALT bound must be between 0 and 100"))]
    pub alt_bound: f64,

    /// Ratio
    #[validate(range(min = 0.0, max = 1.0, message = "Coagulation factor bound must be between 0 and 1"))]
    pub coagulation_bound: f64,

    /// umol/L
    #[validate(range(min = 0.0, max = 100.0, message = "Bilirubin bound must be between 0 and 100"))]
    pub bilirubin_bound: f64,
}

impl Default for HepaticParameters {
    fn default() -> Self {
        Self {
            alt_bound: 45.0,
            coagulation_bound: 0.4,
            bilirubin_bound: 40.0,
        }
    }
}

/// Creatinine (NPU18016) above a bound
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct RenalParameters {
    /// umol/L
    #[validate(range(min = 0.0, max = 1000.0, message = "Creatinine bound must be between 0 and 1000"))]
    pub creatinine_bound: f64,
}

impl Default for RenalParameters {
    fn default() -> Self {
        Self { creatinine_bound: 150.0 }
    }
}

/// Platelets (NPU03568) below a bound for a number of hours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct ThrombocytopeniaParameters {
    /// x10^9/L
    #[validate(range(min = 0.0, max = 50.0, message = "Platelet bound must be between 0 and 50"))]
    pub platelet_bound: f64,

    #[validate(range(min = 24, max = 120, message = "Thrombocytopenia duration must be between 24 and 120 hours"))]
    pub min_hours: u32,
}

impl Default for ThrombocytopeniaParameters {
    fn default() -> Self {
        Self {
            platelet_bound: 10.0,
            min_hours: 72,
        }
    }
}

/// Any pancreatic enzyme at a multiple of its normal limit together with high CRP
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(default)]
pub struct PancreatitisParameters {
    /// Shared multiple of the normal limit
    #[validate(range(min = 1.0, max = 6.0, message = "Multiplier must be between 1 and 6"))]
    pub multiplier: f64,

    /// Overrides `multiplier` for amylase (NPU19652)
    #[validate(range(min = 1.0, max = 6.0, message = "Amylase multiplier must be between 1 and 6"))]
    pub amylase_multiplier: Option<f64>,

    /// Overrides `multiplier` for pancreatic amylase (NPU19653)
    #[validate(range(min = 1.0, max = 6.0, message = "Pancreatic amylase multiplier must be between 1 and 6"))]
    pub pancreatic_amylase_multiplier: Option<f64>,

    /// Overrides `multiplier` for lipase (DNK05451)
    #[validate(range(min = 1.0, max = 6.0, message = "Lipase multiplier must be between 1 and 6"))]
    pub lipase_multiplier: Option<f64>,

    /// mg/L
    #[validate(range(min = 0.0, max = 400.0, message = "CRP bound must be between 0 and 400"))]
    pub crp_bound: f64,
}

impl Default for PancreatitisParameters {
    fn default() -> Self {
        Self {
            multiplier: 3.0,
            amylase_multiplier: None,
            pancreatic_amylase_multiplier: None,
            lipase_multiplier: None,
            crp_bound: 100.0,
        }
    }
}

impl PancreatitisParameters {
    /// Effective multiplier for one of the pancreatic enzymes
    pub fn multiplier_for(&self, analyte: &AnalyteCode) -> f64 {
        let specific = match analyte {
            AnalyteCode::Amylase => self.amylase_multiplier,
            AnalyteCode::PancreaticAmylase => self.pancreatic_amylase_multiplier,
            AnalyteCode::Lipase => self.lipase_multiplier,
            _ => None,
        };
        specific.unwrap_or(self.multiplier)
    }
}

impl RuleParameters {
    /// Validate every range, reporting all violations at once
    pub fn check(&self) -> Result<(), DiagnosisError> {
        if let Some(field) = self.first_non_finite() {
            return Err(DiagnosisError::InvalidParameter(format!(
                "{}: must be a finite number",
                field
            )));
        }

        self.validate()
            .map_err(|errors| DiagnosisError::InvalidParameter(validation_message(&errors)))
    }

    // Range checks let NaN through
    fn first_non_finite(&self) -> Option<&'static str> {
        let values = [
            ("neutropenia.concentration_bound", Some(self.neutropenia.concentration_bound)),
            ("severe_infection.crp_bound", Some(self.severe_infection.crp_bound)),
            ("severe_infection.elevated_bound", Some(self.severe_infection.elevated_bound)),
            ("hepatic.alt_bound", Some(self.hepatic.alt_bound)),
            ("hepatic.coagulation_bound", Some(self.hepatic.coagulation_bound)),
            ("hepatic.bilirubin_bound", Some(self.hepatic.bilirubin_bound)),
            ("renal.creatinine_bound", Some(self.renal.creatinine_bound)),
            ("thrombocytopenia.platelet_bound", Some(self.thrombocytopenia.platelet_bound)),
            ("pancreatitis.multiplier", Some(self.pancreatitis.multiplier)),
            ("pancreatitis.amylase_multiplier", self.pancreatitis.amylase_multiplier),
            (
                "pancreatitis.pancreatic_amylase_multiplier",
                self.pancreatitis.pancreatic_amylase_multiplier,
            ),
            ("pancreatitis.lipase_multiplier", self.pancreatitis.lipase_multiplier),
            ("pancreatitis.crp_bound", Some(self.pancreatitis.crp_bound)),
        ];

        values
            .into_iter()
            .find(|(_, value)| value.map_or(false, |v| !v.is_finite()))
            .map(|(field, _)| field)
    }
}

/// Flatten nested validation errors into `path: message` pairs
pub fn validation_message(errors: &ValidationErrors) -> String {
    let mut messages = Vec::new();
    collect_messages("", errors, &mut messages);
    messages.sort();
    messages.join("; ")
}

fn collect_messages(prefix: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|err| match &err.message {
                        Some(msg) => msg.to_string(),
                        None => format!("Invalid {}", field),
                    })
                    .collect();
                out.push(format!("{}: {}", path, messages.join(", ")));
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_messages(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}
