//! Alert data handed to the notifier by the routing pipeline.
//!
//! These types carry only what a renderer needs; grouping and routing happen
//! upstream.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LabelSet = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Alert
// ---------------------------------------------------------------------------

/// Whether an alert is still active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    Firing,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Firing => write!(f, "firing"),
            Self::Resolved => write!(f, "resolved"),
        }
    }
}

/// A single alert instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alert {
    pub status: AlertStatus,
    #[serde(default)]
    pub labels: LabelSet,
    #[serde(default)]
    pub annotations: LabelSet,
    pub starts_at: DateTime<Utc>,
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub generator_url: Option<String>,
}

impl Alert {
    /// A firing alert named `alertname`, starting now.
    pub fn firing(alertname: &str) -> Self {
        let mut labels = LabelSet::new();
        labels.insert("alertname".into(), alertname.into());
        Self {
            status: AlertStatus::Firing,
            labels,
            annotations: LabelSet::new(),
            starts_at: Utc::now(),
            ends_at: None,
            generator_url: None,
        }
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: &str, value: &str) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_generator_url(mut self, url: &str) -> Self {
        self.generator_url = Some(url.into());
        self
    }

    /// Mark the alert resolved at `at`.
    pub fn resolved_at(mut self, at: DateTime<Utc>) -> Self {
        self.status = AlertStatus::Resolved;
        self.ends_at = Some(at);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.labels.get("alertname").map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Alert group
// ---------------------------------------------------------------------------

/// The batch of alerts delivered by one notify call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertGroup {
    pub receiver: String,
    #[serde(default)]
    pub group_labels: LabelSet,
    #[serde(default)]
    pub common_labels: LabelSet,
    #[serde(default)]
    pub common_annotations: LabelSet,
    #[serde(default)]
    pub external_url: Option<String>,
    pub alerts: Vec<Alert>,
}

impl AlertGroup {
    /// Build a group, deriving the labels and annotations shared by every
    /// alert.
    pub fn new(receiver: impl Into<String>, alerts: Vec<Alert>) -> Self {
        let common_labels = common_pairs(alerts.iter().map(|a| &a.labels));
        let common_annotations = common_pairs(alerts.iter().map(|a| &a.annotations));
        Self {
            receiver: receiver.into(),
            group_labels: LabelSet::new(),
            common_labels,
            common_annotations,
            external_url: None,
            alerts,
        }
    }

    pub fn with_group_label(mut self, key: &str, value: &str) -> Self {
        self.group_labels.insert(key.into(), value.into());
        self
    }

    pub fn with_external_url(mut self, url: &str) -> Self {
        self.external_url = Some(url.into());
        self
    }

    /// Firing if any alert in the group is firing.
    pub fn status(&self) -> AlertStatus {
        if self.firing().next().is_some() {
            AlertStatus::Firing
        } else {
            AlertStatus::Resolved
        }
    }

    pub fn firing(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Firing)
    }

    pub fn resolved(&self) -> impl Iterator<Item = &Alert> {
        self.alerts
            .iter()
            .filter(|a| a.status == AlertStatus::Resolved)
    }
}

fn common_pairs<'a>(mut sets: impl Iterator<Item = &'a LabelSet>) -> LabelSet {
    let Some(first) = sets.next() else {
        return LabelSet::new();
    };
    let mut common = first.clone();
    for set in sets {
        common.retain(|k, v| set.get(k) == Some(v));
    }
    common
}
