use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mtx_tox_data::{AnalyteCode, PatientId, SeriesPoint};

/// Closed time interval over which a criterion was confirmed
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EvidenceWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl EvidenceWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp <= self.end
    }

    /// Overlap of two windows. Windows touching at a single instant overlap.
    pub fn intersect(&self, other: &EvidenceWindow) -> Option<EvidenceWindow> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start <= end).then_some(EvidenceWindow { start, end })
    }
}

/// Sort windows and merge the ones that overlap
pub fn merge_windows(mut windows: Vec<EvidenceWindow>) -> Vec<EvidenceWindow> {
    windows.sort();

    let mut merged: Vec<EvidenceWindow> = Vec::with_capacity(windows.len());
    for window in windows {
        match merged.last_mut() {
            Some(last) if window.start <= last.end => {
                last.end = last.end.max(window.end);
            }
            _ => merged.push(window),
        }
    }
    merged
}

/// Pairwise overlap of two window sets, merged
pub fn intersect_windows(left: &[EvidenceWindow], right: &[EvidenceWindow]) -> Vec<EvidenceWindow> {
    let overlaps = left
        .iter()
        .flat_map(|a| right.iter().filter_map(move |b| a.intersect(b)))
        .collect();
    merge_windows(overlaps)
}

/// Result of running one threshold over one series
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistenceOutcome {
    /// At least one run reached the minimum duration
    pub satisfied: bool,

    /// Confirmed runs in time order
    pub windows: Vec<EvidenceWindow>,

    /// Trailing run that is still too short and has no observation after it
    pub pending: Option<EvidenceWindow>,
}

impl PersistenceOutcome {
    pub fn not_satisfied() -> Self {
        Self::default()
    }

    pub fn is_pending(&self) -> bool {
        !self.satisfied && self.pending.is_some()
    }
}

/// Flag for one (patient, diagnosis) pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisFlag {
    pub patient_id: PatientId,
    pub diagnosis: String,
    pub positive: bool,

    /// Not positive, but some criterion has an unconfirmed trailing run
    pub pending: bool,

    /// Periods over which the diagnosis held. Empty when not positive.
    pub windows: Vec<EvidenceWindow>,

    /// Windows that each contributing analyte supplied
    pub analyte_windows: BTreeMap<AnalyteCode, Vec<EvidenceWindow>>,

    /// The patient has at least one measurement of an analyte this
    /// diagnosis depends on
    #[serde(default)]
    pub measured: bool,
}

impl DiagnosisFlag {
    pub fn negative(patient_id: impl Into<PatientId>, diagnosis: impl Into<String>, pending: bool) -> Self {
        Self {
            patient_id: patient_id.into(),
            diagnosis: diagnosis.into(),
            positive: false,
            pending,
            windows: Vec::new(),
            analyte_windows: BTreeMap::new(),
            measured: false,
        }
    }
}

/// All flags of one evaluation pass, keyed by patient then diagnosis
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct FlagTable {
    flags: BTreeMap<PatientId, BTreeMap<String, DiagnosisFlag>>,
}

impl FlagTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: DiagnosisFlag) {
        self.flags
            .entry(flag.patient_id.clone())
            .or_default()
            .insert(flag.diagnosis.clone(), flag);
    }

    /// Register a patient that may end up with no flags at all
    pub fn insert_patient(&mut self, patient_id: impl Into<PatientId>) {
        self.flags.entry(patient_id.into()).or_default();
    }

    pub fn get(&self, patient_id: &str, diagnosis: &str) -> Option<&DiagnosisFlag> {
        self.flags.get(patient_id).and_then(|flags| flags.get(diagnosis))
    }

    pub fn is_positive(&self, patient_id: &str, diagnosis: &str) -> bool {
        self.get(patient_id, diagnosis).map_or(false, |flag| flag.positive)
    }

    pub fn patient_flags(&self, patient_id: &str) -> Option<&BTreeMap<String, DiagnosisFlag>> {
        self.flags.get(patient_id)
    }

    pub fn patients(&self) -> impl Iterator<Item = &PatientId> {
        self.flags.keys()
    }

    pub fn patient_count(&self) -> usize {
        self.flags.len()
    }

    pub fn positive_patients(&self, diagnosis: &str) -> BTreeSet<PatientId> {
        self.flags
            .iter()
            .filter(|(_, flags)| flags.get(diagnosis).map_or(false, |flag| flag.positive))
            .map(|(patient_id, _)| patient_id.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosisFlag> {
        self.flags.values().flat_map(|flags| flags.values())
    }
}

impl Extend<DiagnosisFlag> for FlagTable {
    fn extend<T: IntoIterator<Item = DiagnosisFlag>>(&mut self, iter: T) {
        for flag in iter {
            self.insert(flag);
        }
    }
}

/// Plottable points and highlighted windows for one analyte
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyteEvidence {
    pub analyte: AnalyteCode,
    pub points: Vec<SeriesPoint>,
    pub windows: Vec<EvidenceWindow>,
}
