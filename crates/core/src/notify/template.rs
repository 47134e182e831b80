//! Message rendering.
//!
//! The notifier only depends on the [`Renderer`] trait; any templating engine
//! can sit behind it. [`DefaultRenderer`] provides the stock
//! `telegram.default.message` and `telegram.default.title` templates, escaped
//! for the configured parse mode.

use crate::config::{ParseMode, TelegramConfig, DEFAULT_MESSAGE_TEMPLATE};
use crate::errors::TemplateError;
use crate::models::{Alert, AlertGroup, AlertStatus, LabelSet};

/// Name of the one-line summary template.
pub const DEFAULT_TITLE_TEMPLATE: &str = "telegram.default.title";

/// Turns an alert group into message text.
pub trait Renderer: Send + Sync {
    fn render(&self, name: &str, group: &AlertGroup) -> Result<String, TemplateError>;

    /// Markup dialect the output is written in, if the renderer commits to
    /// one. The notifier refuses to pair a renderer with a receiver whose
    /// `parse_mode` differs.
    fn dialect(&self) -> Option<ParseMode> {
        None
    }
}

impl<F> Renderer for F
where
    F: Fn(&str, &AlertGroup) -> Result<String, TemplateError> + Send + Sync,
{
    fn render(&self, name: &str, group: &AlertGroup) -> Result<String, TemplateError> {
        self(name, group)
    }
}

/// Built-in templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRenderer {
    dialect: ParseMode,
}

impl DefaultRenderer {
    /// Escape output for `dialect`, normally the receiver's parse mode.
    pub fn new(dialect: ParseMode) -> Self {
        Self { dialect }
    }

    /// Escape output for the receiver's own parse mode.
    pub fn for_config(config: &TelegramConfig) -> Self {
        Self::new(config.parse_mode)
    }

    fn title(&self, group: &AlertGroup) -> String {
        let mut title = match group.status() {
            AlertStatus::Firing => format!("[FIRING:{}]", group.firing().count()),
            AlertStatus::Resolved => "[RESOLVED]".to_string(),
        };

        let group_values = join_values(&group.group_labels);
        if !group_values.is_empty() {
            title.push(' ');
            title.push_str(&group_values);
        }

        let extra: LabelSet = group
            .common_labels
            .iter()
            .filter(|(k, _)| !group.group_labels.contains_key(*k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        if !extra.is_empty() {
            title.push_str(&format!(" ({})", join_values(&extra)));
        }
        title
    }

    fn message(&self, group: &AlertGroup) -> String {
        let mut out = self.bold(&self.title(group));
        out.push('\n');

        let firing: Vec<&Alert> = group.firing().collect();
        if !firing.is_empty() {
            out.push('\n');
            out.push_str(&self.bold("Alerts Firing:"));
            out.push('\n');
            self.alert_list(&mut out, &firing);
        }

        let resolved: Vec<&Alert> = group.resolved().collect();
        if !resolved.is_empty() {
            out.push('\n');
            out.push_str(&self.bold("Alerts Resolved:"));
            out.push('\n');
            self.alert_list(&mut out, &resolved);
        }

        if let Some(ref url) = group.external_url {
            out.push('\n');
            out.push_str(&self.escape(&format!("Alertmanager: {url}")));
            out.push('\n');
        }
        out
    }

    fn alert_list(&self, out: &mut String, alerts: &[&Alert]) {
        for alert in alerts {
            out.push_str(&self.escape("Labels:"));
            out.push('\n');
            for (k, v) in &alert.labels {
                out.push_str(&self.escape(&format!(" - {k} = {v}")));
                out.push('\n');
            }
            if !alert.annotations.is_empty() {
                out.push_str(&self.escape("Annotations:"));
                out.push('\n');
                for (k, v) in &alert.annotations {
                    out.push_str(&self.escape(&format!(" - {k} = {v}")));
                    out.push('\n');
                }
            }
            out.push_str(&self.escape(&format!(
                "Started: {}",
                alert.starts_at.format("%Y-%m-%d %H:%M:%S UTC")
            )));
            out.push('\n');
            if let Some(ref url) = alert.generator_url {
                out.push_str(&self.escape(&format!("Source: {url}")));
                out.push('\n');
            }
        }
    }

    fn bold(&self, text: &str) -> String {
        let escaped = self.escape(text);
        match self.dialect {
            ParseMode::Html => format!("<b>{escaped}</b>"),
            ParseMode::Markdown | ParseMode::MarkdownV2 => format!("*{escaped}*"),
            ParseMode::Plain => escaped,
        }
    }

    fn escape(&self, text: &str) -> String {
        match self.dialect {
            ParseMode::Html => html_escape(text),
            ParseMode::Markdown => backslash_escape(text, "_*`["),
            ParseMode::MarkdownV2 => backslash_escape(text, "_*[]()~`>#+-=|{}.!\\"),
            ParseMode::Plain => text.to_string(),
        }
    }
}

impl Renderer for DefaultRenderer {
    fn render(&self, name: &str, group: &AlertGroup) -> Result<String, TemplateError> {
        match name {
            DEFAULT_MESSAGE_TEMPLATE => Ok(self.message(group)),
            DEFAULT_TITLE_TEMPLATE => Ok(self.escape(&self.title(group))),
            other => Err(TemplateError::UnknownTemplate(other.to_string())),
        }
    }

    fn dialect(&self) -> Option<ParseMode> {
        Some(self.dialect)
    }
}

fn join_values(labels: &LabelSet) -> String {
    labels.values().map(String::as_str).collect::<Vec<_>>().join(" ")
}

/// Minimal HTML escaping for user-provided strings.
fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn backslash_escape(s: &str, special: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
