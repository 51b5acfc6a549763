use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use serde::Serialize;
use tracing::{debug, error};

use mtx_tox_data::AnalyteCode;

use crate::entities::normal_limits::NormalLimits;
use crate::entities::parameters::RuleParameters;
use crate::entities::rules::{Bound, DiagnosisDefinition, DiagnosisKind, RuleExpr, ThresholdRule};
use crate::errors::DiagnosisError;

pub const NEUTROPENIA: &str = "Neutropenia";
pub const SEVERE_INFECTION: &str = "Severe infection";
pub const NEUTROPENIA_WITH_INFECTION: &str = "Neutropenia with infection";
pub const SEVERE_HEPATIC_EFFECTS: &str = "Severe hepatic effects";
pub const RENAL_TOXICITY: &str = "Renal toxicity";
pub const THROMBOCYTOPENIA: &str = "Thrombocytopenia";
pub const PANCREATITIS: &str = "Pancreatitis";

/// One line of the catalog listing
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub derived: bool,
    pub derived_from: Vec<String>,
    pub analytes: Vec<AnalyteCode>,
    pub description: String,
}

/// Validated set of diagnosis definitions
///
/// Construction rejects any definition that could not be evaluated: empty
/// combinator nodes, duplicate names, dangling or cyclic derived references,
/// and limit-relative bounds without a configured normal limit. A catalog
/// that exists is therefore safe to evaluate.
#[derive(Debug, Clone)]
pub struct DiagnosisCatalog {
    definitions: Vec<DiagnosisDefinition>,
    index: BTreeMap<String, usize>,
    order: Vec<usize>,
    limits: NormalLimits,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn invalid_rule(message: String) -> DiagnosisError {
    error!("Rejected diagnosis definition: {}", message);
    DiagnosisError::InvalidRule(message)
}

impl DiagnosisCatalog {
    pub fn new(definitions: Vec<DiagnosisDefinition>, limits: NormalLimits) -> Result<Self, DiagnosisError> {
        let mut index = BTreeMap::new();
        for (position, definition) in definitions.iter().enumerate() {
            if definition.name.trim().is_empty() {
                return Err(invalid_rule(format!("diagnosis #{} has no name", position)));
            }
            if index.insert(definition.name.clone(), position).is_some() {
                return Err(invalid_rule(format!("duplicate diagnosis '{}'", definition.name)));
            }
        }

        for definition in &definitions {
            Self::check_definition(definition, &index, &limits)?;
        }

        let order = Self::topological_order(&definitions, &index)?;
        debug!("Diagnosis catalog validated with {} definitions", definitions.len());

        Ok(Self {
            definitions,
            index,
            order,
            limits,
        })
    }

    fn check_definition(
        definition: &DiagnosisDefinition,
        index: &BTreeMap<String, usize>,
        limits: &NormalLimits,
    ) -> Result<(), DiagnosisError> {
        match &definition.kind {
            DiagnosisKind::Primitive { criteria } => {
                if let Some(operator) = criteria.find_empty_node() {
                    return Err(invalid_rule(format!(
                        "'{}' has an empty {} node",
                        definition.name, operator
                    )));
                }

                for rule in criteria.rules() {
                    rule.check()?;
                    rule.bound.resolve(&rule.analyte, limits)?;
                    if let Some(alternative) = &rule.elevated_for {
                        alternative.bound.resolve(&rule.analyte, limits)?;
                    }
                }
            }
            DiagnosisKind::Derived { from } => {
                if from.is_empty() {
                    return Err(invalid_rule(format!(
                        "derived diagnosis '{}' references no diagnoses",
                        definition.name
                    )));
                }
                for reference in from {
                    if !index.contains_key(reference) {
                        return Err(invalid_rule(format!(
                            "'{}' is derived from unknown diagnosis '{}'",
                            definition.name, reference
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    /// Depth-first post order, so every derived diagnosis follows the ones
    /// it references. Definitions otherwise keep configuration order.
    fn topological_order(
        definitions: &[DiagnosisDefinition],
        index: &BTreeMap<String, usize>,
    ) -> Result<Vec<usize>, DiagnosisError> {
        fn visit(
            node: usize,
            definitions: &[DiagnosisDefinition],
            index: &BTreeMap<String, usize>,
            marks: &mut [Mark],
            path: &mut Vec<usize>,
            order: &mut Vec<usize>,
        ) -> Result<(), DiagnosisError> {
            match marks[node] {
                Mark::Done => return Ok(()),
                Mark::InProgress => {
                    let cycle_start = path.iter().position(|&n| n == node).unwrap_or(0);
                    let mut names: Vec<&str> = path[cycle_start..]
                        .iter()
                        .map(|&n| definitions[n].name.as_str())
                        .collect();
                    names.push(definitions[node].name.as_str());
                    return Err(invalid_rule(format!(
                        "derived diagnoses form a cycle: {}",
                        names.join(" -> ")
                    )));
                }
                Mark::Unvisited => {}
            }

            marks[node] = Mark::InProgress;
            path.push(node);
            for reference in definitions[node].derived_from() {
                if let Some(&next) = index.get(reference) {
                    visit(next, definitions, index, marks, path, order)?;
                }
            }
            path.pop();
            marks[node] = Mark::Done;
            order.push(node);
            Ok(())
        }

        let mut marks = vec![Mark::Unvisited; definitions.len()];
        let mut order = Vec::with_capacity(definitions.len());
        let mut path = Vec::new();
        for node in 0..definitions.len() {
            visit(node, definitions, index, &mut marks, &mut path, &mut order)?;
        }
        Ok(order)
    }

    /// Built-in diagnoses with the given slider values
    pub fn from_parameters(params: &RuleParameters) -> Result<Self, DiagnosisError> {
        params.check()?;
        Self::new(builtin_definitions(params), NormalLimits::default())
    }

    pub fn definitions(&self) -> &[DiagnosisDefinition] {
        &self.definitions
    }

    pub fn get(&self, name: &str) -> Option<&DiagnosisDefinition> {
        self.index.get(name).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Names in configuration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn limits(&self) -> &NormalLimits {
        &self.limits
    }

    /// Definitions with every derived diagnosis after its references
    pub fn evaluation_order(&self) -> impl Iterator<Item = &DiagnosisDefinition> {
        self.order.iter().map(|&i| &self.definitions[i])
    }

    /// Analytes a diagnosis depends on, following derived references
    pub fn analytes_for(&self, name: &str) -> BTreeSet<AnalyteCode> {
        let mut analytes = BTreeSet::new();
        let mut stack = vec![name];
        let mut seen = BTreeSet::new();

        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            match self.get(current).map(|d| &d.kind) {
                Some(DiagnosisKind::Primitive { criteria }) => analytes.extend(criteria.analytes()),
                Some(DiagnosisKind::Derived { from }) => stack.extend(from.iter().map(String::as_str)),
                None => {}
            }
        }
        analytes
    }

    /// Listing for the control surface, in configuration order
    pub fn entries(&self) -> Vec<CatalogEntry> {
        self.definitions
            .iter()
            .map(|definition| CatalogEntry {
                name: definition.name.clone(),
                derived: definition.is_derived(),
                derived_from: definition.derived_from().to_vec(),
                analytes: self.analytes_for(&definition.name).into_iter().collect(),
                description: match &definition.kind {
                    DiagnosisKind::Primitive { criteria } => criteria.to_string(),
                    DiagnosisKind::Derived { from } => format!("ALL({})", from.join(", ")),
                },
            })
            .collect()
    }
}

/// Built-in diagnosis definitions for a parameter set
pub fn builtin_definitions(params: &RuleParameters) -> Vec<DiagnosisDefinition> {
    let neutropenia = &params.neutropenia;
    let infection = &params.severe_infection;
    let hepatic = &params.hepatic;
    let pancreatitis = &params.pancreatitis;

    let enzyme = |analyte: AnalyteCode| {
        let multiplier = pancreatitis.multiplier_for(&analyte);
        RuleExpr::rule(ThresholdRule::at_least_normal_multiple(analyte, multiplier))
    };

    vec![
        DiagnosisDefinition::primitive(
            NEUTROPENIA,
            RuleExpr::rule(
                ThresholdRule::below(AnalyteCode::Neutrophils, neutropenia.concentration_bound)
                    .sustained_for(Duration::days(i64::from(neutropenia.min_days))),
            ),
        ),
        DiagnosisDefinition::primitive(
            SEVERE_INFECTION,
            RuleExpr::rule(
                ThresholdRule::above(AnalyteCode::CReactiveProtein, infection.crp_bound).or_elevated_for(
                    Bound::absolute(infection.elevated_bound),
                    Duration::days(i64::from(infection.elevated_days)),
                ),
            ),
        ),
        DiagnosisDefinition::derived(NEUTROPENIA_WITH_INFECTION, [NEUTROPENIA, SEVERE_INFECTION]),
        DiagnosisDefinition::primitive(
            SEVERE_HEPATIC_EFFECTS,
            RuleExpr::Concurrent(vec![
                RuleExpr::rule(ThresholdRule::above(AnalyteCode::AlanineTransaminase, hepatic.alt_bound)),
                RuleExpr::Any(vec![
                    RuleExpr::rule(ThresholdRule::below(
                        AnalyteCode::CoagulationFactors,
                        hepatic.coagulation_bound,
                    )),
                    RuleExpr::rule(ThresholdRule::above(AnalyteCode::Bilirubin, hepatic.bilirubin_bound)),
                ]),
            ]),
        ),
        DiagnosisDefinition::primitive(
            RENAL_TOXICITY,
            RuleExpr::rule(ThresholdRule::above(
                AnalyteCode::Creatinine,
                params.renal.creatinine_bound,
            )),
        ),
        DiagnosisDefinition::primitive(
            THROMBOCYTOPENIA,
            RuleExpr::rule(
                ThresholdRule::below(AnalyteCode::Platelets, params.thrombocytopenia.platelet_bound)
                    .sustained_for(Duration::hours(i64::from(params.thrombocytopenia.min_hours))),
            ),
        ),
        DiagnosisDefinition::primitive(
            PANCREATITIS,
            RuleExpr::Concurrent(vec![
                RuleExpr::Any(vec![
                    enzyme(AnalyteCode::Amylase),
                    enzyme(AnalyteCode::PancreaticAmylase),
                    enzyme(AnalyteCode::Lipase),
                ]),
                RuleExpr::rule(ThresholdRule::above(
                    AnalyteCode::CReactiveProtein,
                    pancreatitis.crp_bound,
                )),
            ]),
        ),
    ]
}
