use std::collections::BTreeSet;
use std::fmt;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use mtx_tox_data::AnalyteCode;

use super::normal_limits::NormalLimits;
use crate::errors::DiagnosisError;

/// Comparison of a measured value against a bound
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterOrEqual,
}

impl Comparison {
    /// Whether `value` compares true against `bound`. NaN never does.
    pub fn holds(self, value: f64, bound: f64) -> bool {
        match self {
            Comparison::LessThan => value < bound,
            Comparison::LessOrEqual => value <= bound,
            Comparison::GreaterThan => value > bound,
            Comparison::GreaterOrEqual => value >= bound,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::LessThan => "<",
            Comparison::LessOrEqual => "<=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterOrEqual => ">=",
        }
    }
}

/// Bound a rule compares against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Bound {
    /// Fixed value in the analyte's canonical unit
    Absolute { value: f64 },

    /// `multiplier` times the analyte's normal limit
    NormalLimitMultiple { multiplier: f64 },
}

impl Bound {
    pub fn absolute(value: f64) -> Self {
        Bound::Absolute { value }
    }

    pub fn normal_limit_multiple(multiplier: f64) -> Self {
        Bound::NormalLimitMultiple { multiplier }
    }

    /// Numeric bound for `analyte`
    pub fn resolve(&self, analyte: &AnalyteCode, limits: &NormalLimits) -> Result<f64, DiagnosisError> {
        match self {
            Bound::Absolute { value } => Ok(*value),
            Bound::NormalLimitMultiple { multiplier } => limits
                .get(analyte)
                .map(|limit| multiplier * limit.value)
                .ok_or_else(|| {
                    DiagnosisError::InvalidRule(format!("no normal limit configured for {}", analyte))
                }),
        }
    }

    fn check(&self) -> Result<(), DiagnosisError> {
        match self {
            Bound::Absolute { value } if !value.is_finite() => Err(DiagnosisError::InvalidParameter(
                format!("bound {} is not a finite number", value),
            )),
            Bound::NormalLimitMultiple { multiplier } if !(multiplier.is_finite() && *multiplier > 0.0) => {
                Err(DiagnosisError::InvalidParameter(format!(
                    "normal limit multiplier must be positive, got {}",
                    multiplier
                )))
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Absolute { value } => write!(f, "{}", value),
            Bound::NormalLimitMultiple { multiplier } => write!(f, "{} x normal limit", multiplier),
        }
    }
}

/// Alternative criterion on the same analyte: a lower bound that must be
/// sustained for a duration instead of crossed once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElevatedFor {
    pub bound: Bound,

    #[serde(with = "duration_seconds")]
    pub min_duration: Duration,
}

/// Threshold on one analyte, optionally sustained for a minimum duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRule {
    pub analyte: AnalyteCode,
    pub comparison: Comparison,
    pub bound: Bound,

    /// Zero means the threshold only has to hold at one observation
    #[serde(with = "duration_seconds", default = "Duration::zero")]
    pub min_duration: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevated_for: Option<ElevatedFor>,
}

impl ThresholdRule {
    pub fn new(analyte: AnalyteCode, comparison: Comparison, bound: Bound) -> Self {
        Self {
            analyte,
            comparison,
            bound,
            min_duration: Duration::zero(),
            elevated_for: None,
        }
    }

    /// `analyte < value`
    pub fn below(analyte: AnalyteCode, value: f64) -> Self {
        Self::new(analyte, Comparison::LessThan, Bound::absolute(value))
    }

    /// `analyte > value`
    pub fn above(analyte: AnalyteCode, value: f64) -> Self {
        Self::new(analyte, Comparison::GreaterThan, Bound::absolute(value))
    }

    /// `analyte >= multiplier x normal limit`
    pub fn at_least_normal_multiple(analyte: AnalyteCode, multiplier: f64) -> Self {
        Self::new(
            analyte,
            Comparison::GreaterOrEqual,
            Bound::normal_limit_multiple(multiplier),
        )
    }

    pub fn sustained_for(mut self, min_duration: Duration) -> Self {
        self.min_duration = min_duration;
        self
    }

    /// Also accept `analyte <comparison> bound` sustained for `min_duration`
    pub fn or_elevated_for(mut self, bound: Bound, min_duration: Duration) -> Self {
        self.elevated_for = Some(ElevatedFor { bound, min_duration });
        self
    }

    /// Reject negative durations, non-finite bounds and non-positive multipliers
    pub fn check(&self) -> Result<(), DiagnosisError> {
        self.bound.check()?;
        check_duration(&self.analyte, self.min_duration)?;

        if let Some(alternative) = &self.elevated_for {
            alternative.bound.check()?;
            check_duration(&self.analyte, alternative.min_duration)?;
        }

        Ok(())
    }
}

fn check_duration(analyte: &AnalyteCode, duration: Duration) -> Result<(), DiagnosisError> {
    if duration < Duration::zero() {
        return Err(DiagnosisError::InvalidParameter(format!(
            "minimum duration for {} must not be negative",
            analyte
        )));
    }
    Ok(())
}

impl fmt::Display for ThresholdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.analyte, self.comparison.symbol(), self.bound)?;
        if self.min_duration > Duration::zero() {
            write!(f, " for {}", format_duration(self.min_duration))?;
        }
        if let Some(alternative) = &self.elevated_for {
            write!(
                f,
                " (or {} {} for {})",
                self.comparison.symbol(),
                alternative.bound,
                format_duration(alternative.min_duration)
            )?;
        }
        Ok(())
    }
}

/// Format a duration in the largest whole unit that represents it exactly
pub fn format_duration(duration: Duration) -> String {
    let hours = duration.num_hours();
    if duration == Duration::hours(hours) {
        if hours != 0 && hours % 24 == 0 {
            format!("{}d", hours / 24)
        } else {
            format!("{}h", hours)
        }
    } else {
        format!("{}s", duration.num_seconds())
    }
}

/// Combinator tree over threshold rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleExpr {
    /// Single threshold rule
    Rule(ThresholdRule),

    /// Every child must be satisfied
    All(Vec<RuleExpr>),

    /// At least one child must be satisfied
    Any(Vec<RuleExpr>),

    /// Every child must be satisfied during a common period of time
    Concurrent(Vec<RuleExpr>),
}

impl RuleExpr {
    pub fn rule(rule: ThresholdRule) -> Self {
        RuleExpr::Rule(rule)
    }

    /// Leaves in definition order
    pub fn rules(&self) -> Vec<&ThresholdRule> {
        let mut rules = Vec::new();
        self.collect_rules(&mut rules);
        rules
    }

    fn collect_rules<'a>(&'a self, out: &mut Vec<&'a ThresholdRule>) {
        match self {
            RuleExpr::Rule(rule) => out.push(rule),
            RuleExpr::All(children) | RuleExpr::Any(children) | RuleExpr::Concurrent(children) => {
                for child in children {
                    child.collect_rules(out);
                }
            }
        }
    }

    /// Analytes referenced anywhere in the tree
    pub fn analytes(&self) -> BTreeSet<AnalyteCode> {
        self.rules().into_iter().map(|rule| rule.analyte.clone()).collect()
    }

    /// Name of the first combinator node without children, if any
    pub(crate) fn find_empty_node(&self) -> Option<&'static str> {
        match self {
            RuleExpr::Rule(_) => None,
            RuleExpr::All(children) | RuleExpr::Any(children) | RuleExpr::Concurrent(children) => {
                if children.is_empty() {
                    return Some(self.operator());
                }
                children.iter().find_map(RuleExpr::find_empty_node)
            }
        }
    }

    fn operator(&self) -> &'static str {
        match self {
            RuleExpr::Rule(_) => "RULE",
            RuleExpr::All(_) => "ALL",
            RuleExpr::Any(_) => "ANY",
            RuleExpr::Concurrent(_) => "CONCURRENT",
        }
    }
}

impl fmt::Display for RuleExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleExpr::Rule(rule) => write!(f, "{}", rule),
            RuleExpr::All(children) | RuleExpr::Any(children) | RuleExpr::Concurrent(children) => {
                let parts: Vec<String> = children.iter().map(ToString::to_string).collect();
                write!(f, "{}({})", self.operator(), parts.join(", "))
            }
        }
    }
}

/// How a diagnosis is decided
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosisKind {
    /// Evaluated from its own rules
    Primitive { criteria: RuleExpr },

    /// Conjunction of other diagnoses' flags, no rules of its own
    Derived { from: Vec<String> },
}

/// A named diagnosis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisDefinition {
    pub name: String,
    pub kind: DiagnosisKind,
}

impl DiagnosisDefinition {
    pub fn primitive(name: impl Into<String>, criteria: RuleExpr) -> Self {
        Self {
            name: name.into(),
            kind: DiagnosisKind::Primitive { criteria },
        }
    }

    pub fn derived<I, S>(name: impl Into<String>, from: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: DiagnosisKind::Derived {
                from: from.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self.kind, DiagnosisKind::Derived { .. })
    }

    pub fn criteria(&self) -> Option<&RuleExpr> {
        match &self.kind {
            DiagnosisKind::Primitive { criteria } => Some(criteria),
            DiagnosisKind::Derived { .. } => None,
        }
    }

    /// Referenced diagnoses; empty for a primitive diagnosis
    pub fn derived_from(&self) -> &[String] {
        match &self.kind {
            DiagnosisKind::Primitive { .. } => &[],
            DiagnosisKind::Derived { from } => from,
        }
    }

    /// Threshold rules; empty for a derived diagnosis
    pub fn rules(&self) -> Vec<&ThresholdRule> {
        self.criteria().map(RuleExpr::rules).unwrap_or_default()
    }
}

/// Serialize a `chrono::Duration` as whole seconds
pub mod duration_seconds {
    use chrono::Duration;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(duration.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let seconds = i64::deserialize(deserializer)?;
        Duration::try_seconds(seconds).ok_or_else(|| D::Error::custom("duration out of range"))
    }
}
