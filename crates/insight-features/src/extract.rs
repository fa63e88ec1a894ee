// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use crate::defs::{FeatureDef, FeatureKind, FeatureRule, FeatureSet};
use insight_core::Record;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric encoding of one record under a feature set.
///
/// Features whose signal was absent from the record are simply not present
/// in `values`; the batch layer decides how to impute them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub entity_id: String,
    pub values: BTreeMap<String, f64>,
}

impl FeatureVector {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }
}

impl FeatureSet {
    /// Maps a raw record into a feature vector.
    ///
    /// Unknown record fields are ignored; a feature whose inputs are missing
    /// or unusable is left out of the vector rather than failing.
    pub fn extract(&self, record: &Record) -> FeatureVector {
        let mut vector = FeatureVector {
            entity_id: record.id.clone(),
            values: BTreeMap::new(),
        };
        for def in self.features() {
            if let Some(value) = apply_rule(def, record) {
                if value.is_finite() {
                    vector.values.insert(def.name.clone(), value);
                }
            }
        }
        vector
    }
}

fn apply_rule(def: &FeatureDef, record: &Record) -> Option<f64> {
    match &def.rule {
        FeatureRule::NumericField { key } => record.f64_field(key),
        FeatureRule::BooleanField { key } => record.bool_field(key).map(|b| f64::from(u8::from(b))),
        FeatureRule::StringLength { key } => {
            record.str_field(key).map(|s| s.chars().count() as f64)
        }
        FeatureRule::DigitRatio { key } => {
            let text = record.str_field(key)?;
            let total = text.chars().count();
            if total == 0 {
                return None;
            }
            let digits = text.chars().filter(char::is_ascii_digit).count();
            Some(digits as f64 / total as f64)
        }
        FeatureRule::DomainInSet { key, domains } => {
            let domain = email_domain(record.str_field(key)?)?;
            Some(f64::from(u8::from(
                domains.iter().any(|d| d.eq_ignore_ascii_case(domain)),
            )))
        }
        FeatureRule::LocalPartPrefix { key, prefixes } => {
            let local = email_local_part(record.str_field(key)?)?;
            let local_lower = local.to_ascii_lowercase();
            Some(f64::from(u8::from(
                prefixes.iter().any(|p| local_lower.starts_with(p.as_str())),
            )))
        }
        FeatureRule::Ratio {
            numerator,
            denominator,
        } => {
            let num = record.f64_field(numerator)?;
            let den = record.f64_field(denominator)?;
            if den == 0.0 {
                return None;
            }
            Some(num / den)
        }
        FeatureRule::CategoricalLevel { key, levels } => {
            let value = record.str_field(key)?;
            let position = levels.iter().position(|l| l.eq_ignore_ascii_case(value))?;
            if levels.len() == 1 {
                return Some(1.0);
            }
            Some(position as f64 / (levels.len() - 1) as f64)
        }
    }
}

fn email_local_part(address: &str) -> Option<&str> {
    let (local, _) = address.rsplit_once('@')?;
    if local.is_empty() {
        return None;
    }
    Some(local)
}

fn email_domain(address: &str) -> Option<&str> {
    let (_, domain) = address.rsplit_once('@')?;
    if domain.is_empty() {
        return None;
    }
    Some(domain)
}

/// Free-mail providers used for reputation lookups.
pub const FREE_MAIL_DOMAINS: [&str; 6] = [
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "mail.com",
];

/// Local-part prefixes that mark role accounts rather than people.
pub const ROLE_ACCOUNT_PREFIXES: [&str; 8] = [
    "admin", "info", "support", "sales", "noreply", "no-reply", "postmaster", "webmaster",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Standard feature definitions for email-address records.
pub fn email_features() -> FeatureSet {
    FeatureSet::define(
        "email",
        vec![
            FeatureDef {
                name: "local_length".to_string(),
                kind: FeatureKind::Numeric {
                    min: 1.0,
                    max: 64.0,
                },
                required: true,
                rule: FeatureRule::StringLength {
                    key: "local_part".to_string(),
                },
            },
            FeatureDef {
                name: "digit_ratio".to_string(),
                kind: FeatureKind::Numeric { min: 0.0, max: 1.0 },
                required: false,
                rule: FeatureRule::DigitRatio {
                    key: "email".to_string(),
                },
            },
            FeatureDef {
                name: "free_mail".to_string(),
                kind: FeatureKind::Boolean,
                required: false,
                rule: FeatureRule::DomainInSet {
                    key: "email".to_string(),
                    domains: owned(&FREE_MAIL_DOMAINS),
                },
            },
            FeatureDef {
                name: "role_account".to_string(),
                kind: FeatureKind::Boolean,
                required: false,
                rule: FeatureRule::LocalPartPrefix {
                    key: "email".to_string(),
                    prefixes: owned(&ROLE_ACCOUNT_PREFIXES),
                },
            },
            FeatureDef {
                name: "open_rate".to_string(),
                kind: FeatureKind::Numeric { min: 0.0, max: 1.0 },
                required: false,
                rule: FeatureRule::NumericField {
                    key: "open_rate".to_string(),
                },
            },
            FeatureDef {
                name: "bounce_rate".to_string(),
                kind: FeatureKind::Numeric { min: 0.0, max: 1.0 },
                required: false,
                rule: FeatureRule::NumericField {
                    key: "bounce_rate".to_string(),
                },
            },
        ],
    )
    .expect("builtin email feature set is valid")
}

/// Standard feature definitions for company-profile records.
pub fn company_features() -> FeatureSet {
    FeatureSet::define(
        "company",
        vec![
            FeatureDef {
                name: "employee_count".to_string(),
                kind: FeatureKind::Numeric {
                    min: 1.0,
                    max: 100_000.0,
                },
                required: false,
                rule: FeatureRule::NumericField {
                    key: "employee_count".to_string(),
                },
            },
            FeatureDef {
                name: "size_bucket".to_string(),
                kind: FeatureKind::Categorical {
                    levels: vec![
                        "micro".to_string(),
                        "small".to_string(),
                        "medium".to_string(),
                        "large".to_string(),
                        "enterprise".to_string(),
                    ],
                },
                required: false,
                rule: FeatureRule::CategoricalLevel {
                    key: "company_size".to_string(),
                    levels: vec![
                        "micro".to_string(),
                        "small".to_string(),
                        "medium".to_string(),
                        "large".to_string(),
                        "enterprise".to_string(),
                    ],
                },
            },
            FeatureDef {
                name: "revenue_per_employee".to_string(),
                kind: FeatureKind::Numeric {
                    min: 0.0,
                    max: 5_000_000.0,
                },
                required: false,
                rule: FeatureRule::Ratio {
                    numerator: "annual_revenue".to_string(),
                    denominator: "employee_count".to_string(),
                },
            },
            FeatureDef {
                name: "is_manufacturer".to_string(),
                kind: FeatureKind::Boolean,
                required: false,
                rule: FeatureRule::BooleanField {
                    key: "is_manufacturer".to_string(),
                },
            },
        ],
    )
    .expect("builtin company feature set is valid")
}

/// Standard feature definitions for campaign-parameter records.
pub fn campaign_features() -> FeatureSet {
    FeatureSet::define(
        "campaign",
        vec![
            FeatureDef {
                name: "subject_length".to_string(),
                kind: FeatureKind::Numeric {
                    min: 0.0,
                    max: 200.0,
                },
                required: true,
                rule: FeatureRule::StringLength {
                    key: "subject".to_string(),
                },
            },
            FeatureDef {
                name: "personalized".to_string(),
                kind: FeatureKind::Boolean,
                required: false,
                rule: FeatureRule::BooleanField {
                    key: "personalized".to_string(),
                },
            },
            FeatureDef {
                name: "cta_count".to_string(),
                kind: FeatureKind::Numeric { min: 0.0, max: 20.0 },
                required: false,
                rule: FeatureRule::NumericField {
                    key: "cta_count".to_string(),
                },
            },
            FeatureDef {
                name: "image_count".to_string(),
                kind: FeatureKind::Numeric { min: 0.0, max: 50.0 },
                required: false,
                rule: FeatureRule::NumericField {
                    key: "image_count".to_string(),
                },
            },
            FeatureDef {
                name: "segment_size".to_string(),
                kind: FeatureKind::Numeric {
                    min: 1.0,
                    max: 10_000_000.0,
                },
                required: false,
                rule: FeatureRule::NumericField {
                    key: "segment_size".to_string(),
                },
            },
        ],
    )
    .expect("builtin campaign feature set is valid")
}
