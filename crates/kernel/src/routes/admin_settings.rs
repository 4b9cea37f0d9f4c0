//! Admin route for site settings.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::{info, warn};
use uuid::Uuid;

use crate::content::{available_styles, is_known_style};
use crate::error::{AppError, AppResult};
use crate::file::{FAVICON_ASSETS, MediaError, render_favicons};
use crate::form::{Flash, push_flash, require_csrf};
use crate::models::settings::{parse_timezone, timezone_names};
use crate::models::{Media, Settings};
use crate::state::AppState;
use crate::validation::validate_posts_per_page;

use super::helpers::{checkbox, load_settings, render_page};

/// Create the settings router.
pub fn router() -> Router<AppState> {
    Router::new().route("/admin/settings", get(settings_form).post(save_settings))
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFormData {
    #[serde(default)]
    csrf_token: String,
    title: String,
    #[serde(default)]
    subtitle: String,
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    posts_per_page: String,
    #[serde(default)]
    highlight_style: String,
    #[serde(default)]
    logo_id: String,
    use_favicon: Option<String>,
}

/// Image offered as a logo.
#[derive(Debug, Serialize)]
struct LogoChoice {
    id: Uuid,
    name: String,
}

impl SettingsFormData {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            csrf_token: String::new(),
            title: settings.title.clone(),
            subtitle: settings.subtitle.clone(),
            timezone: settings.timezone.clone(),
            posts_per_page: settings.posts_per_page.to_string(),
            highlight_style: settings.highlight_style.clone(),
            logo_id: settings.logo_id.map(|id| id.to_string()).unwrap_or_default(),
            use_favicon: settings.use_favicon.then(|| "on".to_string()),
        }
    }

    fn values(&self) -> serde_json::Value {
        serde_json::json!({
            "title": self.title,
            "subtitle": self.subtitle,
            "timezone": self.timezone,
            "posts_per_page": self.posts_per_page,
            "highlight_style": self.highlight_style,
            "logo_id": self.logo_id,
            "use_favicon": checkbox(self.use_favicon.as_deref()),
        })
    }

    fn to_settings(&self) -> Result<Settings, Vec<String>> {
        let mut errors = Vec::new();

        let title = self.title.trim();
        if title.is_empty() {
            errors.push("Site title is required.".to_string());
        }

        let timezone = match self.timezone.trim() {
            "" => "UTC",
            tz => tz,
        };
        if parse_timezone(timezone).is_none() {
            errors.push("Timezone must be a zone name such as Europe/Paris.".to_string());
        }

        let highlight_style = self.highlight_style.trim();
        if !highlight_style.is_empty() && !is_known_style(highlight_style) {
            errors.push("Choose one of the listed highlighting styles.".to_string());
        }

        let logo_id = match self.logo_id.trim() {
            "" => None,
            raw => match Uuid::parse_str(raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.push("Choose a logo from the media library.".to_string());
                    None
                }
            },
        };

        let use_favicon = checkbox(self.use_favicon.as_deref());
        if use_favicon && self.logo_id.trim().is_empty() {
            errors.push("Favicons are generated from the logo; choose a logo first.".to_string());
        }

        let posts_per_page = self.posts_per_page.trim().parse::<i32>().unwrap_or(0);
        if let Err(e) = validate_posts_per_page(posts_per_page) {
            errors.push(format!("{}.", capitalize_first(&e.message)));
        }

        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Settings {
            title: title.to_string(),
            subtitle: self.subtitle.trim().to_string(),
            timezone: timezone.to_string(),
            posts_per_page,
            highlight_style: highlight_style.to_string(),
            logo_id,
            use_favicon,
        })
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    chars
        .next()
        .map(|c| c.to_uppercase().chain(chars).collect())
        .unwrap_or_default()
}

async fn render_form(
    state: &AppState,
    session: &Session,
    form: &SettingsFormData,
    errors: &[String],
) -> Response {
    let mut context = tera::Context::new();
    context.insert("title", "Settings");
    context.insert("values", &form.values());
    context.insert("errors", errors);
    context.insert("timezones", &timezone_names());
    context.insert("styles", &available_styles());
    context.insert("default_style", state.highlight().default_style());
    context.insert("logos", &logo_choices(state).await);

    let status = if errors.is_empty() {
        StatusCode::OK
    } else {
        StatusCode::UNPROCESSABLE_ENTITY
    };
    let page = render_page(state, session, "admin/settings.html", context).await;
    (status, page).into_response()
}

async fn logo_choices(state: &AppState) -> Vec<LogoChoice> {
    match Media::find_all(state.db()).await {
        Ok(media) => media
            .into_iter()
            .filter(Media::is_image)
            .map(|m| LogoChoice { id: m.id, name: m.name })
            .collect(),
        Err(e) => {
            warn!(error = %e, "failed to list logo candidates");
            Vec::new()
        }
    }
}

/// Look up the chosen logo. `Ok(Err(_))` carries a message for the form.
async fn load_logo(state: &AppState, id: Option<Uuid>) -> AppResult<Result<Option<Media>, String>> {
    let Some(id) = id else {
        return Ok(Ok(None));
    };
    match state.media().find_by_id(id).await {
        Ok(media) if media.is_image() => Ok(Ok(Some(media))),
        Ok(_) => Ok(Err("The logo must be an image.".to_string())),
        Err(MediaError::NotFound) => Ok(Err("The selected logo no longer exists.".to_string())),
        Err(e) => Err(e.into()),
    }
}

/// Render and store every favicon from the logo.
///
/// An undecodable logo is reported back to the form; storage failures are
/// errors.
async fn generate_favicons(state: &AppState, logo: &Media) -> AppResult<Result<(), String>> {
    let data = state.media().read(logo).await?;
    let rendered = tokio::task::spawn_blocking(move || render_favicons(&data))
        .await
        .map_err(|e| AppError::Internal(e.into()))?;

    let icons = match rendered {
        Ok(icons) => icons,
        Err(e) => {
            warn!(media_id = %logo.id, error = %e, "favicon generation failed");
            return Ok(Err(
                "Favicons could not be generated from this logo.".to_string()
            ));
        }
    };

    for (asset, bytes) in icons {
        state.media().store_asset(asset.name, &bytes).await?;
    }
    info!(media_id = %logo.id, count = FAVICON_ASSETS.len(), "favicons generated");
    Ok(Ok(()))
}

async fn remove_favicons(state: &AppState) -> AppResult<()> {
    for asset in FAVICON_ASSETS {
        state.media().remove_asset(asset.name).await?;
    }
    Ok(())
}

/// GET /admin/settings
async fn settings_form(State(state): State<AppState>, session: Session) -> Response {
    let settings = load_settings(&state).await;
    render_form(&state, &session, &SettingsFormData::from_settings(&settings), &[]).await
}

/// POST /admin/settings
async fn save_settings(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<SettingsFormData>,
) -> AppResult<Response> {
    require_csrf(&session, &form.csrf_token).await?;

    let settings = match form.to_settings() {
        Ok(settings) => settings,
        Err(errors) => return Ok(render_form(&state, &session, &form, &errors).await),
    };

    let logo = match load_logo(&state, settings.logo_id).await? {
        Ok(logo) => logo,
        Err(message) => return Ok(render_form(&state, &session, &form, &[message]).await),
    };

    // Icons are in place before the pages start linking them.
    match logo.filter(|_| settings.use_favicon) {
        Some(logo) => {
            if let Err(message) = generate_favicons(&state, &logo).await? {
                return Ok(render_form(&state, &session, &form, &[message]).await);
            }
        }
        None => remove_favicons(&state).await?,
    }

    Settings::update(state.db(), &settings).await?;
    info!(
        timezone = %settings.timezone,
        posts_per_page = settings.posts_per_page,
        highlight_style = %settings.highlight_style,
        use_favicon = settings.use_favicon,
        "settings updated"
    );

    push_flash(&session, Flash::success("Settings saved.")).await;
    Ok(Redirect::to("/admin/settings").into_response())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn form() -> SettingsFormData {
        SettingsFormData {
            title: " My Blog ".to_string(),
            subtitle: "Notes".to_string(),
            timezone: "Europe/Paris".to_string(),
            posts_per_page: "15".to_string(),
            ..SettingsFormData::default()
        }
    }

    #[test]
    fn valid_settings() {
        let settings = form().to_settings().unwrap();
        assert_eq!(settings.title, "My Blog");
        assert_eq!(settings.posts_per_page, 15);
        assert_eq!(settings.timezone, "Europe/Paris");
        assert_eq!(settings.highlight_style, "");
        assert_eq!(settings.logo_id, None);
        assert!(!settings.use_favicon);
    }

    #[test]
    fn offsets_are_not_zones() {
        let mut f = form();
        f.timezone = "+01:00".to_string();
        assert_eq!(
            f.to_settings().unwrap_err(),
            vec!["Timezone must be a zone name such as Europe/Paris.".to_string()]
        );
    }

    #[test]
    fn highlight_style_must_be_bundled() {
        let mut f = form();
        f.highlight_style = "base16-ocean.dark".to_string();
        assert_eq!(f.to_settings().unwrap().highlight_style, "base16-ocean.dark");

        f.highlight_style = "Neon Nights".to_string();
        assert_eq!(f.to_settings().unwrap_err().len(), 1);
    }

    #[test]
    fn favicons_need_a_logo() {
        let mut f = form();
        f.use_favicon = Some("on".to_string());
        assert_eq!(f.to_settings().unwrap_err().len(), 1);

        let id = Uuid::now_v7();
        f.logo_id = id.to_string();
        let settings = f.to_settings().unwrap();
        assert_eq!(settings.logo_id, Some(id));
        assert!(settings.use_favicon);

        f.logo_id = "logo.png".to_string();
        assert_eq!(
            f.to_settings().unwrap_err(),
            vec!["Choose a logo from the media library.".to_string()]
        );
    }

    #[test]
    fn form_round_trips_settings() {
        let settings = Settings {
            logo_id: Some(Uuid::now_v7()),
            use_favicon: true,
            highlight_style: "InspiredGitHub".to_string(),
            ..Settings::default()
        };
        let values = SettingsFormData::from_settings(&settings).values();
        assert_eq!(values["use_favicon"], true);
        assert_eq!(values["highlight_style"], "InspiredGitHub");
        assert_eq!(values["logo_id"], settings.logo_id.unwrap().to_string());
    }

    #[test]
    fn blank_timezone_is_utc() {
        let mut f = form();
        f.timezone = " ".to_string();
        assert_eq!(f.to_settings().unwrap().timezone, "UTC");
    }

    #[test]
    fn every_problem_reported() {
        let f = SettingsFormData {
            title: "".to_string(),
            timezone: "Mars/Olympus".to_string(),
            posts_per_page: "500".to_string(),
            ..SettingsFormData::default()
        };
        let errors = f.to_settings().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[2], "Posts per page must be between 1 and 100.");
    }
}
