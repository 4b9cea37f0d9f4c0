//! Site settings (a single row).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

const COLUMNS: &str = "title, subtitle, timezone, posts_per_page, highlight_style, logo_id, use_favicon";

/// Site settings record.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settings {
    pub title: String,
    pub subtitle: String,
    /// IANA zone name such as `Europe/Paris`.
    pub timezone: String,
    pub posts_per_page: i32,
    /// Syntax highlighting style; empty means the configured default.
    pub highlight_style: String,
    /// Media record shown as the site logo.
    pub logo_id: Option<Uuid>,
    /// Whether pages link the favicons generated from the logo.
    pub use_favicon: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            title: "Quire".to_string(),
            subtitle: String::new(),
            timezone: "UTC".to_string(),
            posts_per_page: 10,
            highlight_style: String::new(),
            logo_id: None,
            use_favicon: false,
        }
    }
}

/// Resolve an IANA timezone name. `UTC` and `Z` are accepted in any case.
pub fn parse_timezone(value: &str) -> Option<Tz> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
        return Some(Tz::UTC);
    }
    value.parse::<Tz>().ok()
}

/// Every known zone name, for the settings form.
pub fn timezone_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = chrono_tz::TZ_VARIANTS.iter().map(|tz| tz.name()).collect();
    names.sort_unstable();
    names
}

impl Settings {
    /// Zone for displaying and entering dates; unknown names mean UTC.
    pub fn tz(&self) -> Tz {
        parse_timezone(&self.timezone).unwrap_or(Tz::UTC)
    }

    /// Format a UTC instant in the site timezone for `datetime-local` inputs.
    pub fn to_local_input(&self, at: DateTime<Utc>) -> String {
        at.with_timezone(&self.tz())
            .format("%Y-%m-%dT%H:%M")
            .to_string()
    }

    /// Interpret a `datetime-local` value as wall-clock time in the site
    /// timezone.
    ///
    /// A time repeated by a DST change resolves to its first occurrence; a
    /// time skipped by one is rejected.
    pub fn from_local_input(&self, value: &str) -> Option<DateTime<Utc>> {
        let value = value.trim();
        let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M")
            .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
            .ok()?;
        self.tz()
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
    }

    /// Posts per page as a query limit.
    pub fn page_size(&self) -> i64 {
        i64::from(self.posts_per_page.clamp(1, 100))
    }

    /// Load the settings row, falling back to defaults when it is missing.
    pub async fn get(pool: &PgPool) -> Result<Self> {
        let settings = sqlx::query_as::<_, Settings>(&format!(
            "SELECT {COLUMNS} FROM settings WHERE id = 1"
        ))
        .fetch_optional(pool)
        .await
        .context("failed to load settings")?;

        Ok(settings.unwrap_or_default())
    }

    /// Store the settings row.
    pub async fn update(pool: &PgPool, settings: &Settings) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings
                (id, title, subtitle, timezone, posts_per_page, highlight_style, logo_id, use_favicon)
            VALUES (1, $1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET title = EXCLUDED.title, subtitle = EXCLUDED.subtitle,
                timezone = EXCLUDED.timezone, posts_per_page = EXCLUDED.posts_per_page,
                highlight_style = EXCLUDED.highlight_style, logo_id = EXCLUDED.logo_id,
                use_favicon = EXCLUDED.use_favicon, updated_at = now()
            "#,
        )
        .bind(&settings.title)
        .bind(&settings.subtitle)
        .bind(&settings.timezone)
        .bind(settings.posts_per_page)
        .bind(&settings.highlight_style)
        .bind(settings.logo_id)
        .bind(settings.use_favicon)
        .execute(pool)
        .await
        .context("failed to update settings")?;

        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn in_zone(timezone: &str) -> Settings {
        Settings {
            timezone: timezone.into(),
            ..Settings::default()
        }
    }

    #[test]
    fn timezone_parsing() {
        assert_eq!(parse_timezone("UTC"), Some(Tz::UTC));
        assert_eq!(parse_timezone(" utc "), Some(Tz::UTC));
        assert_eq!(parse_timezone("Europe/Paris"), Some(Tz::Europe__Paris));
        assert_eq!(parse_timezone("America/Argentina/Buenos_Aires"), Some(Tz::America__Argentina__Buenos_Aires));
        assert!(parse_timezone("Mars/Olympus").is_none());
        assert!(parse_timezone("+02:00").is_none());
        assert!(parse_timezone("").is_none());
    }

    #[test]
    fn summer_and_winter_offsets_differ() {
        let paris = in_zone("Europe/Paris");

        let winter = paris.from_local_input("2024-01-15T10:00").unwrap();
        assert_eq!(winter.to_rfc3339(), "2024-01-15T09:00:00+00:00");

        let summer = paris.from_local_input("2024-07-15T10:00").unwrap();
        assert_eq!(summer.to_rfc3339(), "2024-07-15T08:00:00+00:00");
        assert_eq!(paris.to_local_input(summer), "2024-07-15T10:00");
    }

    #[test]
    fn dst_transitions() {
        let paris = in_zone("Europe/Paris");

        // 02:30 does not exist on the last Sunday of March.
        assert!(paris.from_local_input("2024-03-31T02:30").is_none());

        // 02:30 happens twice on the last Sunday of October; take the first.
        let repeated = paris.from_local_input("2024-10-27T02:30").unwrap();
        assert_eq!(repeated.to_rfc3339(), "2024-10-27T00:30:00+00:00");
    }

    #[test]
    fn local_input_rejects_garbage() {
        assert!(in_zone("UTC").from_local_input("yesterday").is_none());
        assert!(in_zone("UTC").from_local_input("2024-05-01T10:30:15").is_some());
    }

    #[test]
    fn unknown_timezone_is_utc() {
        assert_eq!(in_zone("Mars/Olympus").tz(), Tz::UTC);
    }

    #[test]
    fn zone_list_is_sorted_and_complete() {
        let names = timezone_names();
        assert!(names.contains(&"UTC"));
        assert!(names.contains(&"Europe/Paris"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn page_size_is_clamped() {
        let mut settings = Settings::default();
        settings.posts_per_page = 0;
        assert_eq!(settings.page_size(), 1);
        settings.posts_per_page = 500;
        assert_eq!(settings.page_size(), 100);
    }
}
