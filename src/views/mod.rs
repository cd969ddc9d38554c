//! Server-rendered pages and the JSON/binary endpoints next to them.
pub mod account;
pub mod adopt;
pub mod animals;
pub mod api;
pub mod donate;
pub mod lost;
pub mod pages;
pub mod shelters;

use crate::auth::CurrentUser;
use crate::error::AppError;
use crate::models::animal::AnimalCard;
use crate::route;
use crate::router::{AppState, Flash, Request, Response, Router, access_log, login_required};
use crate::template::{TemplateValue, context_from};
use serde::Serialize;
use std::collections::HashMap;

pub const SITE_NAME: &str = "AdoptaMendoza";

/// Register every page and endpoint on `router`.
pub fn register_routes(router: &mut Router) {
    route!(router,
        GET "/" => { pages::home },
        GET "/historias" => { pages::stories },

        GET "/adopta" => { adopt::index },
        GET "/adopta/nueva" => { adopt::new_form, login_required() },
        POST "/adopta/nueva" => { adopt::create, login_required() },

        GET "/mascotas/:id" => { animals::detail },
        GET "/mascotas/:id/editar" => { animals::edit_form, login_required() },
        POST "/mascotas/:id/editar" => { animals::update, login_required() },
        POST "/mascotas/:id/estado" => { animals::change_status, login_required() },
        POST "/mascotas/:id/eliminar" => { animals::delete, login_required() },

        GET "/favoritos" => { animals::favorites, login_required() },
        POST "/favoritos/:id" => { animals::toggle_favorite },

        GET "/encontra" => { lost::map },
        GET "/encontra/reportar" => { lost::report_form, login_required() },
        POST "/encontra/reportar" => { lost::report, login_required() },
        GET "/encontra/avistamiento" => { lost::sighting_form, login_required() },
        POST "/encontra/avistamiento" => { lost::sighting, login_required() },

        GET "/refugios" => { shelters::index },
        GET "/refugios/:id" => { shelters::detail },

        GET "/login" => { account::login_form },
        POST "/login" => { account::login },
        GET "/register" => { account::register_form },
        POST "/register" => { account::register },
        POST "/logout" => { account::logout },
        GET "/perfil" => { account::profile, login_required() },
        POST "/perfil" => { account::update_profile, login_required() },

        GET "/donar" => { donate::page },
        POST "/donar" => { donate::choose_amount },

        POST "/api/create-preference" => { api::create_preference },
        POST "/api/upload/:bucket" => { api::upload },
        GET "/media/*path" => { api::media },
    );
}

/// The site router with its state and access log attached.
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();
    register_routes(&mut router);
    router.add_post_middleware(access_log());
    router.set_app_state(state);
    router
}

/// Grid card as the templates see it.
#[derive(Clone, Debug, Serialize)]
pub struct CardView {
    pub id: String,
    pub name: String,
    pub breed: String,
    pub species: &'static str,
    pub species_label: &'static str,
    pub sex_label: &'static str,
    pub size_label: &'static str,
    pub age: String,
    pub status: &'static str,
    pub status_label: &'static str,
    pub photo: Option<String>,
    pub shelter_name: Option<String>,
    pub next_status: Option<&'static str>,
    pub next_status_label: Option<&'static str>,
}

impl From<&AnimalCard> for CardView {
    fn from(card: &AnimalCard) -> Self {
        let next = card.status.next_resolution();
        CardView {
            id: card.id.clone(),
            name: card.name.clone(),
            breed: card.breed.clone(),
            species: card.species.as_str(),
            species_label: card.species.label(),
            sex_label: card.sex.label(),
            size_label: card.size.map(|s| s.label()).unwrap_or(""),
            age: card.age_approx.clone(),
            status: card.status.as_str(),
            status_label: card.status.label(),
            photo: card.photos.first().map(str::to_string),
            shelter_name: card.shelter_name.clone(),
            next_status: next.map(|s| s.as_str()),
            next_status_label: next.map(|s| s.label()),
        }
    }
}

pub fn cards(items: &[AnimalCard]) -> Vec<CardView> {
    items.iter().map(CardView::from).collect()
}

/// `<select>` option with its selected flag resolved server-side.
#[derive(Clone, Debug, Serialize)]
pub struct SelectOption {
    pub value: &'static str,
    pub label: &'static str,
    pub selected: bool,
}

pub fn options<T: Copy + PartialEq>(
    all: &[T],
    current: Option<T>,
    value: impl Fn(&T) -> &'static str,
    label: impl Fn(&T) -> &'static str,
) -> Vec<SelectOption> {
    all.iter()
        .map(|v| SelectOption {
            value: value(v),
            label: label(v),
            selected: current == Some(*v),
        })
        .collect()
}

/// Render `template` with the shared layout keys (user, flash, debug) merged in.
/// A pending flash cookie is cleared once it has been shown.
pub fn render<T: Serialize>(state: &AppState, req: &Request, template: &str, data: &T) -> Response {
    render_with_status(state, req, template, data, 200)
}

pub fn render_with_status<T: Serialize>(
    state: &AppState,
    req: &Request,
    template: &str,
    data: &T,
    status: u16,
) -> Response {
    let mut ctx = match context_from(data) {
        Ok(ctx) => ctx,
        Err(e) => {
            log::error!("Failed to build context for {}: {}", template, e);
            return Response::server_error();
        }
    };

    ctx.insert("site_name".into(), SITE_NAME.into());
    ctx.insert("debug".into(), state.settings.debug.into());
    ctx.insert("current_path".into(), req.path.clone().into());
    ctx.insert("is_authenticated".into(), req.user.is_some().into());
    if let Some(user) = &req.user {
        let mut map = HashMap::new();
        map.insert("id".to_string(), user.id.clone().into());
        map.insert("email".to_string(), user.email.clone().into());
        ctx.insert("user".into(), TemplateValue::Object(map));
    }

    let flash = req.flash();
    if let Some(f) = &flash {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), f.kind.clone().into());
        map.insert("message".to_string(), f.message.clone().into());
        ctx.insert("flash".into(), TemplateValue::Object(map));
    }

    let mut resp = state.templates.render(template, &ctx);
    if resp.status_code == 200 {
        resp.status_code = status;
    }
    if flash.is_some() {
        resp = resp.with_cookie(Flash::clear_cookie());
    }
    resp
}

pub fn not_found_page(state: &AppState, req: &Request) -> Response {
    render_with_status(state, req, "404.html", &serde_json::json!({}), 404)
}

/// The signed-in user. Routes behind `login_required` always have one.
pub fn require_user(req: &Request) -> Result<CurrentUser, Response> {
    req.user.clone().ok_or_else(|| {
        Response::redirect(format!("/login?next={}", urlencoding::encode(&req.target())))
            .with_flash(Flash::error("Debes iniciar sesión para continuar."))
    })
}

/// Map a failed action to a page: missing rows 404, everything else a flash and a redirect.
pub fn fail(state: &AppState, req: &Request, err: AppError, back: &str) -> Response {
    match &err {
        AppError::NotFound(what) => {
            log::warn!("{} {}: not found ({})", req.method, req.path, what);
            not_found_page(state, req)
        }
        AppError::Validation(_) | AppError::Forbidden(_) | AppError::InvalidInput(_) => {
            log::warn!("{} {}: {}", req.method, req.path, err);
            Response::redirect(back).with_flash(Flash::error(err.public_message()))
        }
        _ => {
            log::error!("{} {}: {}", req.method, req.path, err);
            Response::redirect(back).with_flash(Flash::error(err.public_message()))
        }
    }
}

/// Only same-site paths are accepted as post-action destinations.
pub fn safe_next(next: Option<&str>, fallback: &str) -> String {
    match next {
        Some(n) if n.starts_with('/') && !n.starts_with("//") && !n.contains('\\') => n.to_string(),
        _ => fallback.to_string(),
    }
}
