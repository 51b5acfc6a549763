use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use mtx_tox_data::SeriesPoint;

use crate::entities::flags::{merge_windows, EvidenceWindow, PersistenceOutcome};
use crate::entities::normal_limits::NormalLimits;
use crate::entities::rules::{Comparison, ThresholdRule};
use crate::errors::DiagnosisError;

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

/// Where a run that is broken by an out-of-range observation ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum WindowEndPolicy {
    /// At the first observation that reports the condition false
    #[default]
    NextObservation,

    /// At the last observation that reports the condition true
    LastTrueObservation,
}

/// Scans one analyte series as a right-continuous step function
#[derive(Debug, Clone, Copy, Default)]
pub struct PersistenceEvaluator {
    policy: WindowEndPolicy,
}

impl PersistenceEvaluator {
    pub fn new(policy: WindowEndPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> WindowEndPolicy {
        self.policy
    }

    /// Find every run over which `value <comparison> bound` held for at least
    /// `min_duration`.
    ///
    /// `points` must be sorted by timestamp. A run still open at the end of
    /// the series is measured up to its last observation; if that is shorter
    /// than `min_duration` the run is reported as pending instead of
    /// confirmed, since nothing yet shows whether it continued.
    pub fn evaluate(
        &self,
        points: &[SeriesPoint],
        comparison: Comparison,
        bound: f64,
        min_duration: Duration,
    ) -> PersistenceOutcome {
        let mut outcome = PersistenceOutcome::not_satisfied();
        let mut run: Option<(DateTime<Utc>, DateTime<Utc>)> = None;

        for point in points {
            if comparison.holds(point.value, bound) {
                run = match run {
                    Some((start, _)) => Some((start, point.timestamp)),
                    None => Some((point.timestamp, point.timestamp)),
                };
                continue;
            }

            if let Some((start, last_true)) = run.take() {
                let end = match self.policy {
                    WindowEndPolicy::NextObservation => point.timestamp,
                    WindowEndPolicy::LastTrueObservation => last_true,
                };
                let window = EvidenceWindow::new(start, end);
                if window.span() >= min_duration {
                    outcome.windows.push(window);
                }
            }
        }

        if let Some((start, last_true)) = run {
            let window = EvidenceWindow::new(start, last_true);
            if window.span() >= min_duration {
                outcome.windows.push(window);
            } else {
                outcome.pending = Some(window);
            }
        }

        outcome.satisfied = !outcome.windows.is_empty();
        outcome
    }

    /// Evaluate a threshold rule, including its sustained alternative
    pub fn evaluate_rule(
        &self,
        points: &[SeriesPoint],
        rule: &ThresholdRule,
        limits: &NormalLimits,
    ) -> Result<PersistenceOutcome, DiagnosisError> {
        let bound = rule.bound.resolve(&rule.analyte, limits)?;
        let primary = self.evaluate(points, rule.comparison, bound, rule.min_duration);

        let Some(alternative) = &rule.elevated_for else {
            return Ok(primary);
        };

        let alternative_bound = alternative.bound.resolve(&rule.analyte, limits)?;
        let secondary = self.evaluate(points, rule.comparison, alternative_bound, alternative.min_duration);

        let satisfied = primary.satisfied || secondary.satisfied;
        let mut windows = primary.windows;
        windows.extend(secondary.windows);

        Ok(PersistenceOutcome {
            satisfied,
            windows: merge_windows(windows),
            pending: if satisfied { None } else { primary.pending.or(secondary.pending) },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::rules::Bound;
    use chrono::TimeZone;
    use mtx_tox_data::AnalyteCode;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn days(points: &[(i64, f64)]) -> Vec<SeriesPoint> {
        points
            .iter()
            .map(|(d, v)| SeriesPoint::new(t0() + Duration::days(*d), *v))
            .collect()
    }

    fn hours(points: &[(i64, f64)]) -> Vec<SeriesPoint> {
        points
            .iter()
            .map(|(h, v)| SeriesPoint::new(t0() + Duration::hours(*h), *v))
            .collect()
    }

    #[test]
    fn test_run_ends_at_next_observation() {
        let series = days(&[(0, 0.3), (5, 0.3), (11, 0.2), (20, 0.6)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            0.5,
            Duration::days(10),
        );

        assert!(outcome.satisfied);
        assert_eq!(
            outcome.windows,
            vec![EvidenceWindow::new(t0(), t0() + Duration::days(20))]
        );
        assert!(outcome.pending.is_none());
    }

    #[test]
    fn test_last_true_policy_shortens_window() {
        let series = days(&[(0, 0.3), (5, 0.3), (11, 0.2), (20, 0.6)]);
        let evaluator = PersistenceEvaluator::new(WindowEndPolicy::LastTrueObservation);

        let outcome = evaluator.evaluate(&series, Comparison::LessThan, 0.5, Duration::days(10));
        assert_eq!(
            outcome.windows,
            vec![EvidenceWindow::new(t0(), t0() + Duration::days(11))]
        );

        let outcome = evaluator.evaluate(&series, Comparison::LessThan, 0.5, Duration::days(12));
        assert!(!outcome.satisfied);
    }

    #[test]
    fn test_trailing_run_long_enough_is_confirmed() {
        let series = hours(&[(0, 8.0), (40, 9.0), (90, 8.0)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            10.0,
            Duration::hours(72),
        );

        assert!(outcome.satisfied);
        assert_eq!(outcome.windows[0].span(), Duration::hours(90));
    }

    #[test]
    fn test_trailing_run_too_short_is_pending() {
        let series = hours(&[(0, 8.0), (40, 9.0), (60, 8.0)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            10.0,
            Duration::hours(72),
        );

        assert!(!outcome.satisfied);
        assert!(outcome.is_pending());
        assert_eq!(
            outcome.pending,
            Some(EvidenceWindow::new(t0(), t0() + Duration::hours(60)))
        );
    }

    #[test]
    fn test_single_point_never_confirms_duration() {
        let series = days(&[(3, 0.1)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            0.5,
            Duration::days(1),
        );

        assert!(!outcome.satisfied);
        assert!(outcome.is_pending());
    }

    #[test]
    fn test_single_true_point_closed_by_later_observation() {
        // The step function holds from the true point until the next observation
        let series = days(&[(0, 0.2), (15, 0.9)]);

        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            0.5,
            Duration::days(10),
        );
        assert!(outcome.satisfied);
        assert_eq!(
            outcome.windows,
            vec![EvidenceWindow::new(t0(), t0() + Duration::days(15))]
        );

        let outcome = PersistenceEvaluator::new(WindowEndPolicy::LastTrueObservation).evaluate(
            &series,
            Comparison::LessThan,
            0.5,
            Duration::days(10),
        );
        assert!(!outcome.satisfied);
        assert!(!outcome.is_pending());
    }

    #[test]
    fn test_gap_does_not_break_run() {
        // 30 days without a sample, no false observation in between
        let series = days(&[(0, 0.2), (30, 0.2), (31, 0.9)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            0.5,
            Duration::days(10),
        );
        assert!(outcome.satisfied);
    }

    #[test]
    fn test_short_run_before_break_is_discarded() {
        let series = days(&[(0, 0.2), (3, 0.9), (4, 0.2), (16, 0.2), (17, 0.8)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::LessThan,
            0.5,
            Duration::days(10),
        );

        assert_eq!(
            outcome.windows,
            vec![EvidenceWindow::new(t0() + Duration::days(4), t0() + Duration::days(17))]
        );
    }

    #[test]
    fn test_multiple_disjoint_runs_recorded() {
        let series = hours(&[(0, 200.0), (1, 50.0), (5, 180.0), (6, 20.0), (9, 160.0)]);
        let outcome = PersistenceEvaluator::default().evaluate(
            &series,
            Comparison::GreaterThan,
            150.0,
            Duration::zero(),
        );

        assert!(outcome.satisfied);
        assert_eq!(outcome.windows.len(), 3);
        assert_eq!(outcome.windows[2].span(), Duration::zero());
    }

    #[test]
    fn test_zero_duration_matches_per_point_comparison() {
        let values = [140.0, 151.0, 150.0, 149.0, 300.0, 10.0, 150.5];
        for len in 0..=values.len() {
            for bound in [0.0, 149.0, 150.0, 151.0, 400.0] {
                let series: Vec<SeriesPoint> = values[..len]
                    .iter()
                    .enumerate()
                    .map(|(i, v)| SeriesPoint::new(t0() + Duration::hours(i as i64), *v))
                    .collect();

                let expected = series.iter().any(|p| p.value > bound);
                let outcome = PersistenceEvaluator::default().evaluate(
                    &series,
                    Comparison::GreaterThan,
                    bound,
                    Duration::zero(),
                );
                assert_eq!(outcome.satisfied, expected, "len {} bound {}", len, bound);
                assert!(outcome.pending.is_none());
            }
        }
    }

    #[test]
    fn test_empty_series_not_satisfied() {
        let outcome = PersistenceEvaluator::default().evaluate(
            &[],
            Comparison::LessThan,
            0.5,
            Duration::days(10),
        );
        assert_eq!(outcome, PersistenceOutcome::not_satisfied());
    }

    #[test]
    fn test_rule_alternative_satisfies_when_instant_bound_fails() {
        let rule = ThresholdRule::above(AnalyteCode::CReactiveProtein, 100.0)
            .or_elevated_for(Bound::absolute(8.0), Duration::days(7));
        let series = days(&[(0, 20.0), (4, 30.0), (8, 25.0), (9, 5.0)]);

        let outcome = PersistenceEvaluator::default()
            .evaluate_rule(&series, &rule, &NormalLimits::default())
            .unwrap();
        assert!(outcome.satisfied);
        assert_eq!(
            outcome.windows,
            vec![EvidenceWindow::new(t0(), t0() + Duration::days(9))]
        );
    }

    #[test]
    fn test_rule_instant_bound_satisfies_immediately() {
        let rule = ThresholdRule::above(AnalyteCode::CReactiveProtein, 100.0)
            .or_elevated_for(Bound::absolute(8.0), Duration::days(7));
        let series = days(&[(0, 150.0), (1, 150.0)]);

        let outcome = PersistenceEvaluator::default()
            .evaluate_rule(&series, &rule, &NormalLimits::default())
            .unwrap();
        assert!(outcome.satisfied);
        assert!(outcome.pending.is_none());
    }

    #[test]
    fn test_rule_normal_limit_multiple() {
        let rule = ThresholdRule::at_least_normal_multiple(AnalyteCode::Amylase, 3.0);
        let series = days(&[(0, 359.0), (1, 360.0)]);

        let outcome = PersistenceEvaluator::default()
            .evaluate_rule(&series, &rule, &NormalLimits::default())
            .unwrap();
        assert!(outcome.satisfied);
        assert_eq!(outcome.windows[0].start, t0() + Duration::days(1));
    }
}
