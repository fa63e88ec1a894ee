// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::factors::{combine, reasons_from_factors, FactorWeights, ScoreResult};
use insight_core::{clamp_unit, EngineError, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

const EXCELLENT_CUTOFF: f64 = 0.9;
const GOOD_CUTOFF: f64 = 0.75;
const FAIR_CUTOFF: f64 = 0.55;
const POOR_CUTOFF: f64 = 0.35;

const ROLE_ACCOUNT_MULTIPLIER: f64 = 0.85;
const FREE_MAIL_MULTIPLIER: f64 = 0.95;
const DISPOSABLE_MULTIPLIER: f64 = 0.3;

/// Address age (days) at which the age factor saturates.
const ADDRESS_AGE_SATURATION_DAYS: f64 = 730.0;

const FREE_MAIL_DOMAINS: [&str; 6] = [
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "mail.com",
];

const DISPOSABLE_DOMAINS: [&str; 6] = [
    "mailinator.com",
    "guerrillamail.com",
    "10minutemail.com",
    "tempmail.com",
    "throwaway.email",
    "yopmail.com",
];

const ROLE_PREFIXES: [&str; 8] = [
    "admin", "info", "support", "sales", "noreply", "no-reply", "postmaster", "webmaster",
];

/// Discrete quality bucket derived from the continuous score.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityTier {
    Invalid,
    Poor,
    Fair,
    Good,
    Excellent,
}

impl QualityTier {
    pub fn from_score(score: f64) -> Self {
        if score >= EXCELLENT_CUTOFF {
            Self::Excellent
        } else if score >= GOOD_CUTOFF {
            Self::Good
        } else if score >= FAIR_CUTOFF {
            Self::Fair
        } else if score >= POOR_CUTOFF {
            Self::Poor
        } else {
            Self::Invalid
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::Invalid => "invalid",
        }
    }
}

/// Deterministic weighted scorer for individual email addresses.
///
/// Every factor degrades gracefully: a missing signal scores the neutral
/// 0.5 baseline instead of failing the call.
pub struct EmailQualityClassifier {
    weights: FactorWeights,
}

impl Default for EmailQualityClassifier {
    fn default() -> Self {
        Self::new().expect("builtin quality weights are valid")
    }
}

impl EmailQualityClassifier {
    pub fn new() -> Result<Self, EngineError> {
        let weights = FactorWeights::new(
            [
                ("deliverability".to_string(), 0.3),
                ("domain_reputation".to_string(), 0.25),
                ("syntax_quality".to_string(), 0.2),
                ("engagement".to_string(), 0.15),
                ("address_age".to_string(), 0.1),
            ]
            .into_iter()
            .collect(),
        )?;
        Ok(Self { weights })
    }

    pub fn with_weights(weights: FactorWeights) -> Self {
        Self { weights }
    }

    pub fn score(&self, record: &Record) -> Result<ScoreResult, EngineError> {
        let email = record.str_field("email");
        let domain = email.and_then(|e| e.rsplit_once('@')).map(|(_, d)| d);
        let local = email.and_then(|e| e.rsplit_once('@')).map(|(l, _)| l);

        let mut values: BTreeMap<String, Option<f64>> = BTreeMap::new();
        values.insert(
            "deliverability".to_string(),
            record
                .f64_field("bounce_rate")
                .map(|bounce| clamp_unit(1.0 - bounce)),
        );
        values.insert(
            "domain_reputation".to_string(),
            domain.map(domain_reputation),
        );
        values.insert("syntax_quality".to_string(), email.map(syntax_quality));
        values.insert("engagement".to_string(), engagement_signal(record));
        values.insert(
            "address_age".to_string(),
            record
                .f64_field("address_age_days")
                .map(|days| clamp_unit(days / ADDRESS_AGE_SATURATION_DAYS)),
        );

        let mut bonuses = Vec::new();
        if let Some(local) = local {
            let local_lower = local.to_ascii_lowercase();
            if ROLE_PREFIXES.iter().any(|p| local_lower.starts_with(p)) {
                bonuses.push(("role_account".to_string(), ROLE_ACCOUNT_MULTIPLIER));
            }
        }
        if let Some(domain) = domain {
            if DISPOSABLE_DOMAINS.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
                bonuses.push(("disposable_domain".to_string(), DISPOSABLE_MULTIPLIER));
            } else if FREE_MAIL_DOMAINS.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
                bonuses.push(("free_mail".to_string(), FREE_MAIL_MULTIPLIER));
            }
        }

        let (total, factors) = combine(&self.weights, &values, &bonuses)?;
        let total = clamp_unit(total);
        let tier = QualityTier::from_score(total);

        let mut reasons = reasons_from_factors(&factors);
        for (name, _) in &bonuses {
            reasons.push(format!("penalty applied: {name}"));
        }

        debug!(entity = %record.id, total, tier = tier.as_str(), "scored email quality");
        Ok(ScoreResult {
            entity_id: record.id.clone(),
            total,
            tier: tier.as_str().to_string(),
            factors,
            reasons,
            recommendation: recommendation_for(tier),
        })
    }
}

fn domain_reputation(domain: &str) -> f64 {
    if DISPOSABLE_DOMAINS.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
        return 0.05;
    }
    if FREE_MAIL_DOMAINS.iter().any(|d| d.eq_ignore_ascii_case(domain)) {
        return 0.6;
    }
    // Corporate domains with a sane shape score well.
    let has_dot = domain.contains('.');
    let ascii = domain.is_ascii();
    match (has_dot, ascii) {
        (true, true) => 0.85,
        (true, false) => 0.5,
        _ => 0.2,
    }
}

fn syntax_quality(email: &str) -> f64 {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return 0.0;
    };
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return 0.1;
    }
    let mut score: f64 = 1.0;
    let digits = local.chars().filter(char::is_ascii_digit).count();
    let digit_ratio = digits as f64 / local.chars().count().max(1) as f64;
    if digit_ratio > 0.5 {
        score -= 0.4;
    }
    if local.contains("..") || local.starts_with('.') || local.ends_with('.') {
        score -= 0.5;
    }
    if !email.is_ascii() {
        score -= 0.3;
    }
    if local.chars().count() > 40 {
        score -= 0.2;
    }
    score.max(0.0)
}

fn engagement_signal(record: &Record) -> Option<f64> {
    let open = record.f64_field("open_rate");
    let click = record.f64_field("click_rate");
    match (open, click) {
        // Clicks are rarer than opens; weigh them higher.
        (Some(open), Some(click)) => Some(clamp_unit(0.6 * open + 0.4 * (click * 5.0))),
        (Some(open), None) => Some(clamp_unit(open)),
        (None, Some(click)) => Some(clamp_unit(click * 5.0)),
        (None, None) => None,
    }
}

fn recommendation_for(tier: QualityTier) -> String {
    match tier {
        QualityTier::Excellent => "safe to send; prioritize in campaigns".to_string(),
        QualityTier::Good => "safe to send".to_string(),
        QualityTier::Fair => "send with monitoring; review engagement".to_string(),
        QualityTier::Poor => "revalidate before the next campaign".to_string(),
        QualityTier::Invalid => "suppress from sends".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::{EmailQualityClassifier, QualityTier};
    use insight_core::Record;

    fn classifier() -> EmailQualityClassifier {
        EmailQualityClassifier::new().unwrap()
    }

    #[test]
    fn tiers_follow_fixed_cutoffs() {
        assert_eq!(QualityTier::from_score(0.95), QualityTier::Excellent);
        assert_eq!(QualityTier::from_score(0.8), QualityTier::Good);
        assert_eq!(QualityTier::from_score(0.6), QualityTier::Fair);
        assert_eq!(QualityTier::from_score(0.4), QualityTier::Poor);
        assert_eq!(QualityTier::from_score(0.1), QualityTier::Invalid);
    }

    #[test]
    fn healthy_corporate_address_scores_well() {
        let record = Record::new("e-1")
            .with("email", "maria.lopez@acme-corp.com")
            .with("bounce_rate", 0.01)
            .with("open_rate", 0.55)
            .with("click_rate", 0.12)
            .with("address_age_days", 900.0);
        let result = classifier().score(&record).unwrap();
        assert!(result.total >= 0.8, "total={}", result.total);
        assert!(result.tier == "excellent" || result.tier == "good");
        assert!(result.reasons.iter().any(|r| r.contains("deliverability")));
    }

    #[test]
    fn disposable_domain_is_heavily_penalized() {
        let record = Record::new("e-2")
            .with("email", "xyz@mailinator.com")
            .with("bounce_rate", 0.02);
        let result = classifier().score(&record).unwrap();
        assert!(result.total < 0.35, "total={}", result.total);
        assert_eq!(result.tier, "invalid");
        assert!(result
            .reasons
            .iter()
            .any(|r| r.contains("disposable_domain")));
    }

    #[test]
    fn missing_signals_fall_back_to_neutral_not_error() {
        let record = Record::new("e-3");
        let result = classifier().score(&record).unwrap();
        // Every factor imputed at 0.5 gives exactly the neutral total.
        assert!((result.total - 0.5).abs() < 1e-9, "total={}", result.total);
        assert!(result.factors.iter().all(|f| f.imputed));
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn role_account_multiplier_lowers_the_score() {
        let personal = Record::new("p")
            .with("email", "jane@acme.io")
            .with("bounce_rate", 0.05);
        let role = Record::new("r")
            .with("email", "support@acme.io")
            .with("bounce_rate", 0.05);
        let personal_score = classifier().score(&personal).unwrap().total;
        let role_score = classifier().score(&role).unwrap().total;
        assert!(role_score < personal_score);
    }

    #[test]
    fn scores_stay_in_unit_interval() {
        let records = [
            Record::new("a").with("email", "x@y.z").with("open_rate", 9.0),
            Record::new("b").with("email", "1234567@gmail.com"),
            Record::new("c").with("bounce_rate", 1.0),
        ];
        for record in records {
            let result = classifier().score(&record).unwrap();
            assert!((0.0..=1.0).contains(&result.total), "total={}", result.total);
        }
    }
}
