// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::series::{validate_series, SeriesPoint};
use chrono::{Duration, NaiveDate};
use insight_core::{linear_fit, EngineError};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

const DEFAULT_HEALTH_THRESHOLD: f64 = 0.8;
const DEFAULT_MIN_HISTORY: usize = 7;

/// How soon a list should be revalidated, bucketed by days of health
/// remaining.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevalidationInterval {
    Immediate,
    Weekly,
    Biweekly,
    Monthly,
    Quarterly,
}

impl RevalidationInterval {
    fn from_days_remaining(days: Option<i64>) -> Self {
        match days {
            Some(d) if d <= 0 => Self::Immediate,
            Some(d) if d <= 14 => Self::Weekly,
            Some(d) if d <= 45 => Self::Biweekly,
            Some(d) if d <= 120 => Self::Monthly,
            _ => Self::Quarterly,
        }
    }
}

/// Linear-decay assessment of one list's validation rate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecayAssessment {
    pub entity_id: String,
    pub current_rate: f64,
    /// Fitted change in validation rate per day; negative means decay.
    pub daily_change: f64,
    /// Date the fitted line crosses the health threshold, when it decays.
    pub crosses_threshold_on: Option<NaiveDate>,
    pub days_remaining: Option<i64>,
    pub revalidation: RevalidationInterval,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DegradationConfig {
    pub health_threshold: f64,
    pub min_history: usize,
}

impl Default for DegradationConfig {
    fn default() -> Self {
        Self {
            health_threshold: DEFAULT_HEALTH_THRESHOLD,
            min_history: DEFAULT_MIN_HISTORY,
        }
    }
}

struct ListTrack {
    history: Vec<SeriesPoint>,
    assessment: Option<DecayAssessment>,
}

/// Tracks per-list validation-rate history and predicts when each list
/// decays past the configured health threshold.
pub struct DegradationTracker {
    config: DegradationConfig,
    lists: RwLock<HashMap<String, ListTrack>>,
}

impl DegradationTracker {
    pub fn new(config: DegradationConfig) -> Result<Self, EngineError> {
        if !(0.0..=1.0).contains(&config.health_threshold)
            || !config.health_threshold.is_finite()
        {
            return Err(EngineError::invalid_input(format!(
                "health_threshold must be within [0, 1], got {}",
                config.health_threshold
            )));
        }
        if config.min_history < 2 {
            return Err(EngineError::invalid_input(
                "min_history must be >= 2 to fit a decay line",
            ));
        }
        Ok(Self {
            config,
            lists: RwLock::new(HashMap::new()),
        })
    }

    /// Appends one dated validation-rate observation for a list.
    pub fn record_observation(
        &self,
        entity_id: &str,
        date: NaiveDate,
        rate: f64,
    ) -> Result<(), EngineError> {
        if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
            return Err(EngineError::invalid_input(format!(
                "validation rate must be within [0, 1], got {rate}"
            )));
        }
        let mut lists = self.lists.write();
        let track = lists
            .entry(entity_id.to_string())
            .or_insert_with(|| ListTrack {
                history: Vec::new(),
                assessment: None,
            });
        track.history.push(SeriesPoint::new(date, rate));
        track.history.sort_by_key(|p| p.date);
        Ok(())
    }

    /// Fits the decay line and predicts the threshold-crossing date.
    ///
    /// A fresh assessment supersedes the stored one for the same list.
    pub fn assess(&self, entity_id: &str) -> Result<DecayAssessment, EngineError> {
        let mut lists = self.lists.write();
        let track = lists
            .get_mut(entity_id)
            .ok_or_else(|| EngineError::insufficient_history(self.config.min_history, 0))?;
        validate_series(&track.history, self.config.min_history)?;

        let first_date = track.history[0].date;
        let samples: Vec<(f64, f64)> = track
            .history
            .iter()
            .map(|p| ((p.date - first_date).num_days() as f64, p.value))
            .collect();
        let (intercept, slope) = linear_fit(&samples)
            .ok_or_else(|| EngineError::invalid_input("decay fit is ill-conditioned"))?;

        let last = &track.history[track.history.len() - 1];
        let last_day = (last.date - first_date).num_days() as f64;
        let fitted_now = intercept + slope * last_day;

        let (crosses_threshold_on, days_remaining) = if slope < 0.0 {
            if fitted_now <= self.config.health_threshold {
                (Some(last.date), Some(0))
            } else {
                let days_ahead =
                    ((self.config.health_threshold - fitted_now) / slope).ceil() as i64;
                (
                    Some(last.date + Duration::days(days_ahead)),
                    Some(days_ahead),
                )
            }
        } else {
            // Flat or improving: the line never crosses going forward.
            (None, None)
        };

        let assessment = DecayAssessment {
            entity_id: entity_id.to_string(),
            current_rate: last.value,
            daily_change: slope,
            crosses_threshold_on,
            days_remaining,
            revalidation: RevalidationInterval::from_days_remaining(days_remaining),
        };

        if assessment.revalidation == RevalidationInterval::Immediate {
            warn!(
                entity = entity_id,
                rate = last.value,
                "list is at or below the health threshold"
            );
        } else {
            debug!(
                entity = entity_id,
                daily_change = slope,
                "list decay assessed"
            );
        }
        track.assessment = Some(assessment.clone());
        Ok(assessment)
    }

    /// Pure accessor: the latest stored assessment for a list.
    pub fn get_assessment(&self, entity_id: &str) -> Option<DecayAssessment> {
        self.lists
            .read()
            .get(entity_id)
            .and_then(|track| track.assessment.clone())
    }

    /// Pure accessor: lists whose current rate is already below the health
    /// threshold or predicted to cross within two weeks.
    pub fn get_critical_lists(&self) -> Vec<DecayAssessment> {
        let mut critical: Vec<DecayAssessment> = self
            .lists
            .read()
            .values()
            .filter_map(|track| track.assessment.clone())
            .filter(|a| {
                a.current_rate < self.config.health_threshold
                    || matches!(a.days_remaining, Some(d) if d <= 14)
            })
            .collect();
        critical.sort_by(|a, b| {
            a.days_remaining
                .unwrap_or(i64::MAX)
                .cmp(&b.days_remaining.unwrap_or(i64::MAX))
        });
        critical
    }
}

#[cfg(test)]
mod tests {
    use super::{DegradationConfig, DegradationTracker, RevalidationInterval};
    use chrono::NaiveDate;
    use insight_core::EngineError;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 1).unwrap() + chrono::Duration::days(offset)
    }

    fn tracker() -> DegradationTracker {
        DegradationTracker::new(DegradationConfig::default()).unwrap()
    }

    fn seed_decaying(tracker: &DegradationTracker, entity: &str, start: f64, per_day: f64) {
        for i in 0..14 {
            tracker
                .record_observation(entity, day(i), (start - per_day * i as f64).clamp(0.0, 1.0))
                .unwrap();
        }
    }

    #[test]
    fn decaying_list_predicts_a_crossing_date() {
        let tracker = tracker();
        // 0.95 dropping 0.007/day crosses 0.8 about 9 days after day 13.
        seed_decaying(&tracker, "list-1", 0.95, 0.007);
        let assessment = tracker.assess("list-1").unwrap();

        assert!(assessment.daily_change < 0.0);
        let days = assessment.days_remaining.unwrap();
        assert!((8..=10).contains(&days), "days={days}");
        assert_eq!(
            assessment.crosses_threshold_on.unwrap(),
            day(13 + days)
        );
        assert_eq!(assessment.revalidation, RevalidationInterval::Weekly);
    }

    #[test]
    fn stable_list_never_crosses() {
        let tracker = tracker();
        for i in 0..14 {
            tracker.record_observation("list-2", day(i), 0.93).unwrap();
        }
        let assessment = tracker.assess("list-2").unwrap();
        assert!(assessment.crosses_threshold_on.is_none());
        assert_eq!(assessment.revalidation, RevalidationInterval::Quarterly);
    }

    #[test]
    fn already_unhealthy_list_is_immediate() {
        let tracker = tracker();
        seed_decaying(&tracker, "list-3", 0.78, 0.004);
        let assessment = tracker.assess("list-3").unwrap();
        assert_eq!(assessment.days_remaining, Some(0));
        assert_eq!(assessment.revalidation, RevalidationInterval::Immediate);
    }

    #[test]
    fn slow_decay_lands_in_a_longer_bucket() {
        let tracker = tracker();
        // 0.95 dropping 0.001/day has ~140 days of headroom at day 13.
        seed_decaying(&tracker, "list-4", 0.95, 0.001);
        let assessment = tracker.assess("list-4").unwrap();
        let days = assessment.days_remaining.unwrap();
        assert!(days > 120, "days={days}");
        assert_eq!(assessment.revalidation, RevalidationInterval::Quarterly);
    }

    #[test]
    fn assessment_requires_minimum_history() {
        let tracker = tracker();
        tracker.record_observation("list-5", day(0), 0.9).unwrap();
        let err = tracker.assess("list-5").unwrap_err();
        assert!(matches!(err, EngineError::InsufficientHistory { .. }));

        let err = tracker.assess("never-seen").unwrap_err();
        assert!(matches!(err, EngineError::InsufficientHistory { .. }));
    }

    #[test]
    fn later_assessment_supersedes_the_stored_one() {
        let tracker = tracker();
        seed_decaying(&tracker, "list-6", 0.95, 0.005);
        let first = tracker.assess("list-6").unwrap();

        // Another week of sharper decay changes the picture.
        for i in 14..21 {
            tracker
                .record_observation("list-6", day(i), 0.95 - 0.012 * i as f64)
                .unwrap();
        }
        let second = tracker.assess("list-6").unwrap();
        assert_ne!(first, second);
        assert_eq!(tracker.get_assessment("list-6").unwrap(), second);
    }

    #[test]
    fn critical_lists_surface_low_and_soon_to_cross() {
        let tracker = tracker();
        seed_decaying(&tracker, "healthy", 0.97, 0.0);
        seed_decaying(&tracker, "dying", 0.88, 0.004);
        seed_decaying(&tracker, "dead", 0.7, 0.005);
        for entity in ["healthy", "dying", "dead"] {
            tracker.assess(entity).unwrap();
        }

        let critical = tracker.get_critical_lists();
        let names: Vec<&str> = critical.iter().map(|a| a.entity_id.as_str()).collect();
        assert!(names.contains(&"dying"));
        assert!(names.contains(&"dead"));
        assert!(!names.contains(&"healthy"));
        // Most urgent first.
        assert_eq!(names[0], "dead");
    }

    #[test]
    fn out_of_range_rates_are_rejected() {
        let tracker = tracker();
        assert!(tracker.record_observation("x", day(0), 1.2).is_err());
        assert!(tracker.record_observation("x", day(0), f64::NAN).is_err());
    }
}
