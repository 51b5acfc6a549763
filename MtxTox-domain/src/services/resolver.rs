use std::collections::BTreeMap;

use tracing::debug;

use mtx_tox_data::{AnalyteCode, PatientSeries};

use crate::entities::flags::{intersect_windows, merge_windows, DiagnosisFlag, EvidenceWindow};
use crate::entities::rules::{DiagnosisDefinition, DiagnosisKind, RuleExpr};
use crate::errors::DiagnosisError;
use crate::services::catalog::DiagnosisCatalog;
use crate::services::persistence::PersistenceEvaluator;

type AnalyteWindows = BTreeMap<AnalyteCode, Vec<EvidenceWindow>>;

/// Evaluation result of one node of a rule tree
#[derive(Debug, Clone, Default, PartialEq)]
struct NodeOutcome {
    satisfied: bool,
    pending: bool,
    windows: Vec<EvidenceWindow>,
    analyte_windows: AnalyteWindows,
}

impl NodeOutcome {
    fn unsatisfied(pending: bool) -> Self {
        Self {
            pending,
            ..Self::default()
        }
    }
}

fn union_analyte_windows<'a, I>(sources: I) -> AnalyteWindows
where
    I: IntoIterator<Item = &'a AnalyteWindows>,
{
    let mut union: AnalyteWindows = BTreeMap::new();
    for source in sources {
        for (analyte, windows) in source {
            union.entry(analyte.clone()).or_default().extend(windows.iter().copied());
        }
    }
    union
        .into_iter()
        .map(|(analyte, windows)| (analyte, merge_windows(windows)))
        .collect()
}

fn clip_analyte_windows(analyte_windows: AnalyteWindows, common: &[EvidenceWindow]) -> AnalyteWindows {
    analyte_windows
        .into_iter()
        .map(|(analyte, windows)| (analyte, intersect_windows(&windows, common)))
        .filter(|(_, windows)| !windows.is_empty())
        .collect()
}

/// Turns one patient's series into a flag per diagnosis
pub struct DiagnosisResolver<'a> {
    catalog: &'a DiagnosisCatalog,
    evaluator: PersistenceEvaluator,
}

impl<'a> DiagnosisResolver<'a> {
    pub fn new(catalog: &'a DiagnosisCatalog, evaluator: PersistenceEvaluator) -> Self {
        Self { catalog, evaluator }
    }

    /// Flags for every catalog diagnosis, in evaluation order
    pub fn resolve_patient(&self, series: &PatientSeries) -> Result<Vec<DiagnosisFlag>, DiagnosisError> {
        let mut resolved: BTreeMap<&str, DiagnosisFlag> = BTreeMap::new();
        let mut order = Vec::with_capacity(self.catalog.len());

        for definition in self.catalog.evaluation_order() {
            let flag = self.resolve_definition(definition, series, &resolved)?;
            debug!(
                patient_id = series.patient_id(),
                diagnosis = %definition.name,
                positive = flag.positive,
                pending = flag.pending,
                "Resolved diagnosis"
            );
            order.push(definition.name.as_str());
            resolved.insert(definition.name.as_str(), flag);
        }

        Ok(order
            .into_iter()
            .filter_map(|name| resolved.remove(name))
            .collect())
    }

    fn resolve_definition(
        &self,
        definition: &DiagnosisDefinition,
        series: &PatientSeries,
        resolved: &BTreeMap<&str, DiagnosisFlag>,
    ) -> Result<DiagnosisFlag, DiagnosisError> {
        match &definition.kind {
            DiagnosisKind::Primitive { criteria } => {
                let outcome = self.evaluate_node(criteria, series)?;
                Ok(self.into_flag(definition, series, outcome))
            }
            DiagnosisKind::Derived { from } => {
                let references = from
                    .iter()
                    .map(|name| {
                        resolved.get(name.as_str()).ok_or_else(|| {
                            DiagnosisError::InvalidRule(format!(
                                "'{}' evaluated before its reference '{}'",
                                definition.name, name
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                let outcome = Self::combine_derived(&references);
                Ok(self.into_flag(definition, series, outcome))
            }
        }
    }

    /// Conjunction of the referenced flags. Evidence is restricted to the
    /// period during which all of them held.
    fn combine_derived(references: &[&DiagnosisFlag]) -> NodeOutcome {
        let positive = references.iter().all(|flag| flag.positive);
        if !positive {
            let pending = references.iter().any(|flag| !flag.positive && flag.pending);
            return NodeOutcome::unsatisfied(pending);
        }

        let mut common: Option<Vec<EvidenceWindow>> = None;
        for flag in references {
            common = Some(match common {
                None => flag.windows.clone(),
                Some(acc) => intersect_windows(&acc, &flag.windows),
            });
        }
        let common = common.unwrap_or_default();

        let analyte_windows = union_analyte_windows(references.iter().map(|flag| &flag.analyte_windows));

        NodeOutcome {
            satisfied: true,
            pending: false,
            analyte_windows: clip_analyte_windows(analyte_windows, &common),
            windows: common,
        }
    }

    fn evaluate_node(&self, node: &RuleExpr, series: &PatientSeries) -> Result<NodeOutcome, DiagnosisError> {
        match node {
            RuleExpr::Rule(rule) => {
                let points = series.series(&rule.analyte);
                if points.is_empty() {
                    // Absence of an analyte is not evidence either way
                    return Ok(NodeOutcome::unsatisfied(false));
                }

                let outcome = self.evaluator.evaluate_rule(points, rule, self.catalog.limits())?;
                let mut analyte_windows = BTreeMap::new();
                if outcome.satisfied {
                    analyte_windows.insert(rule.analyte.clone(), outcome.windows.clone());
                }

                Ok(NodeOutcome {
                    satisfied: outcome.satisfied,
                    pending: outcome.is_pending(),
                    windows: outcome.windows,
                    analyte_windows,
                })
            }
            RuleExpr::All(children) => {
                let outcomes = self.evaluate_children(children, series)?;
                let satisfied = outcomes.iter().all(|o| o.satisfied);
                if !satisfied {
                    return Ok(NodeOutcome::unsatisfied(outcomes.iter().any(|o| o.pending)));
                }

                Ok(NodeOutcome {
                    satisfied,
                    pending: false,
                    windows: merge_windows(outcomes.iter().flat_map(|o| o.windows.iter().copied()).collect()),
                    analyte_windows: union_analyte_windows(outcomes.iter().map(|o| &o.analyte_windows)),
                })
            }
            RuleExpr::Any(children) => {
                let outcomes = self.evaluate_children(children, series)?;
                let matched: Vec<&NodeOutcome> = outcomes.iter().filter(|o| o.satisfied).collect();
                if matched.is_empty() {
                    return Ok(NodeOutcome::unsatisfied(outcomes.iter().any(|o| o.pending)));
                }

                Ok(NodeOutcome {
                    satisfied: true,
                    pending: false,
                    windows: merge_windows(matched.iter().flat_map(|o| o.windows.iter().copied()).collect()),
                    analyte_windows: union_analyte_windows(matched.iter().map(|o| &o.analyte_windows)),
                })
            }
            RuleExpr::Concurrent(children) => {
                let outcomes = self.evaluate_children(children, series)?;
                let pending = outcomes.iter().any(|o| o.pending);
                if !outcomes.iter().all(|o| o.satisfied) {
                    return Ok(NodeOutcome::unsatisfied(pending));
                }

                let mut common = outcomes.first().map(|o| o.windows.clone()).unwrap_or_default();
                for outcome in outcomes.iter().skip(1) {
                    common = intersect_windows(&common, &outcome.windows);
                }
                if common.is_empty() {
                    return Ok(NodeOutcome::unsatisfied(pending));
                }

                let analyte_windows = union_analyte_windows(outcomes.iter().map(|o| &o.analyte_windows));
                Ok(NodeOutcome {
                    satisfied: true,
                    pending: false,
                    analyte_windows: clip_analyte_windows(analyte_windows, &common),
                    windows: common,
                })
            }
        }
    }

    fn evaluate_children(
        &self,
        children: &[RuleExpr],
        series: &PatientSeries,
    ) -> Result<Vec<NodeOutcome>, DiagnosisError> {
        children.iter().map(|child| self.evaluate_node(child, series)).collect()
    }

    fn into_flag(&self, definition: &DiagnosisDefinition, series: &PatientSeries, outcome: NodeOutcome) -> DiagnosisFlag {
        let measured = self
            .catalog
            .analytes_for(&definition.name)
            .iter()
            .any(|analyte| !series.series(analyte).is_empty());

        if !outcome.satisfied {
            let mut flag = DiagnosisFlag::negative(series.patient_id(), definition.name.clone(), outcome.pending);
            flag.measured = measured;
            return flag;
        }

        DiagnosisFlag {
            patient_id: series.patient_id().to_string(),
            diagnosis: definition.name.clone(),
            positive: true,
            pending: false,
            windows: outcome.windows,
            analyte_windows: outcome.analyte_windows,
            measured,
        }
    }
}
