//! Theme engine with Tera templates.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tera::Tera;
use tracing::debug;

use crate::models::settings::parse_timezone;

/// Default date format for templates.
pub const DEFAULT_DATE_FORMAT: &str = "%B %-d, %Y";

/// Theme engine for rendering templates.
pub struct ThemeEngine {
    /// Tera template engine instance.
    tera: Tera,
}

impl ThemeEngine {
    /// Create a new theme engine loading templates from the given directory.
    pub fn new(template_dir: &Path) -> Result<Self> {
        let pattern = template_dir.join("**/*.html");
        let pattern_str = pattern
            .to_str()
            .context("invalid template directory path")?;

        let mut tera = Tera::new(pattern_str).context("failed to initialize Tera templates")?;
        Self::register_filters(&mut tera);

        let template_names: Vec<_> = tera.get_template_names().collect();
        debug!(count = template_names.len(), "loaded templates");

        Ok(Self { tera })
    }

    /// Create a theme engine with no templates (for testing).
    pub fn empty() -> Self {
        let mut tera = Tera::default();
        Self::register_filters(&mut tera);
        Self { tera }
    }

    /// Register custom Tera filters.
    fn register_filters(tera: &mut Tera) {
        // Formats an RFC 3339 timestamp; `tz` names the zone to show it in
        // and `format` overrides the strftime pattern.
        tera.register_filter(
            "format_date",
            |value: &tera::Value, args: &HashMap<String, tera::Value>| {
                let raw = tera::try_get_value!("format_date", "value", String, value);
                let tz = args
                    .get("tz")
                    .and_then(|v| v.as_str())
                    .and_then(parse_timezone);
                let format = args
                    .get("format")
                    .and_then(|v| v.as_str())
                    .unwrap_or(DEFAULT_DATE_FORMAT);

                Ok(tera::Value::String(format_date(&raw, tz, format)))
            },
        );
    }

    /// Add a template from a string (used by tests and fallbacks).
    pub fn add_raw_template(&mut self, name: &str, content: &str) -> Result<()> {
        self.tera
            .add_raw_template(name, content)
            .with_context(|| format!("failed to add template {name}"))
    }

    /// Whether a template with this name is loaded.
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a template.
    pub fn render(&self, name: &str, context: &tera::Context) -> Result<String> {
        self.tera
            .render(name, context)
            .with_context(|| format!("failed to render template {name}"))
    }
}

impl std::fmt::Debug for ThemeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeEngine")
            .field("templates", &self.tera.get_template_names().count())
            .finish()
    }
}

/// Format an RFC 3339 timestamp, returning the input unchanged if it does
/// not parse.
pub fn format_date(raw: &str, tz: Option<Tz>, format: &str) -> String {
    let Ok(parsed) = DateTime::parse_from_rfc3339(raw) else {
        return raw.to_string();
    };
    let utc = parsed.with_timezone(&Utc);
    match tz {
        Some(tz) => utc.with_timezone(&tz).format(format).to_string(),
        None => utc.format(format).to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn format_date_applies_zone() {
        let raw = "2024-03-10T23:30:00Z";
        assert_eq!(format_date(raw, None, DEFAULT_DATE_FORMAT), "March 10, 2024");
        assert_eq!(
            format_date(raw, parse_timezone("Europe/Athens"), "%Y-%m-%d %H:%M"),
            "2024-03-11 01:30"
        );
        assert_eq!(
            format_date("2024-07-10T23:30:00Z", parse_timezone("Europe/Athens"), "%H:%M"),
            "02:30"
        );
        assert_eq!(format_date("soon", None, DEFAULT_DATE_FORMAT), "soon");
    }

    #[test]
    fn filter_is_registered() {
        let mut engine = ThemeEngine::empty();
        engine
            .add_raw_template("d.html", "{{ at | format_date(tz=\"Atlantic/Azores\", format=\"%H:%M\") }}")
            .unwrap();
        let mut context = tera::Context::new();
        context.insert("at", "2024-01-01T10:00:00+00:00");
        assert_eq!(engine.render("d.html", &context).unwrap(), "09:00");
        assert!(engine.has_template("d.html"));
    }
}
