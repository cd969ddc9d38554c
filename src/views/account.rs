use super::{cards, fail, render, render_with_status, require_user, safe_next};
use crate::auth::{self, SESSION_COOKIE};
use crate::error::AppError;
use crate::models::{Animal, Profile};
use crate::router::{AppState, Flash, Request, Response};
use serde_json::json;

fn login_page(state: &AppState, req: &Request, email: &str, next: &str, error: Option<String>) -> Response {
    let status = if error.is_some() { 401 } else { 200 };
    let data = json!({ "email": email, "next": next, "error": error });
    render_with_status(state, req, "login.html", &data, status)
}

pub async fn login_form(req: Request, state: AppState) -> Response {
    let next = safe_next(req.query_param("next"), "/");
    if req.user.is_some() {
        return Response::redirect(next);
    }
    login_page(&state, &req, "", &next, None)
}

pub async fn login(req: Request, state: AppState) -> Response {
    let form = req.form();
    let email = form.get("email").cloned().unwrap_or_default();
    let password = form.get("password").cloned().unwrap_or_default();
    let next = safe_next(form.get("next").map(String::as_str), "/");

    match auth::login(&state.db, &email, &password, state.settings.session_ttl).await {
        Ok(token) => Response::redirect(next)
            .with_cookie(auth::session_cookie(&token, state.settings.session_ttl))
            .with_flash(Flash::success("¡Bienvenido de nuevo!")),
        Err(AppError::Unauthorized(msg)) => login_page(&state, &req, &email, &next, Some(msg)),
        Err(e) => {
            log::error!("Login failed: {}", e);
            login_page(&state, &req, &email, &next, Some("Error al iniciar sesión".into()))
        }
    }
}

fn register_page(state: &AppState, req: &Request, full_name: &str, email: &str, error: Option<String>) -> Response {
    let status = if error.is_some() { 400 } else { 200 };
    let data = json!({ "full_name": full_name, "email": email, "error": error });
    render_with_status(state, req, "register.html", &data, status)
}

pub async fn register_form(req: Request, state: AppState) -> Response {
    if req.user.is_some() {
        return Response::redirect("/");
    }
    register_page(&state, &req, "", "", None)
}

/// Create the account and sign it in straight away.
pub async fn register(req: Request, state: AppState) -> Response {
    let form = req.form();
    let full_name = form.get("full_name").cloned().unwrap_or_default();
    let email = form.get("email").cloned().unwrap_or_default();
    let password = form.get("password").cloned().unwrap_or_default();

    if let Err(e) = auth::register(&state.db, &email, &password, &full_name).await {
        let msg = match e {
            AppError::Validation(msg) => msg,
            other => {
                log::error!("Registration failed: {}", other);
                "Error al registrarse".to_string()
            }
        };
        return register_page(&state, &req, &full_name, &email, Some(msg));
    }

    match auth::login(&state.db, &email, &password, state.settings.session_ttl).await {
        Ok(token) => Response::redirect("/")
            .with_cookie(auth::session_cookie(&token, state.settings.session_ttl))
            .with_flash(Flash::success("¡Registro exitoso! Bienvenido a AdoptaMendoza.")),
        Err(e) => {
            log::error!("Sign-in after registration failed: {}", e);
            Response::redirect("/login").with_flash(Flash::success("¡Registro exitoso! Ya puedes iniciar sesión."))
        }
    }
}

pub async fn logout(req: Request, state: AppState) -> Response {
    if let Some(token) = req.cookie(SESSION_COOKIE) {
        if let Err(e) = auth::logout(&state.db, &token).await {
            log::error!("Error closing session: {}", e);
        }
    }
    Response::redirect("/").with_cookie(auth::clear_session_cookie())
}

/// Dashboard: the user's listings, or the contact settings tab.
pub async fn profile(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let settings_tab = req.query_param("tab") == Some("settings");

    let loaded = futures::try_join!(
        Profile::find(&state.db, &user.id),
        Animal::list_by_owner(&state.db, &user.id),
    );
    let (profile, listings) = match loaded {
        Ok(v) => v,
        Err(e) => return fail(&state, &req, e, "/"),
    };
    let profile = profile.unwrap_or_else(|| Profile {
        id: user.id.clone(),
        email: Some(user.email.clone()),
        ..Default::default()
    });

    let data = json!({
        "settings_tab": settings_tab,
        "profile": {
            "full_name": profile.full_name.clone().unwrap_or_default(),
            "phone": profile.phone.clone().unwrap_or_default(),
            "email": profile.email.clone().unwrap_or_else(|| user.email.clone()),
            "display_name": profile.display_name().unwrap_or(&user.email),
        },
        "listings": cards(&listings),
    });
    render(&state, &req, "perfil.html", &data)
}

pub async fn update_profile(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let form = req.form();
    let full_name = form.get("full_name").map(String::as_str).unwrap_or("");
    let phone = form.get("phone").map(String::as_str).unwrap_or("");

    match Profile::update_contact(&state.db, &user.id, full_name, phone).await {
        Ok(_) => Response::redirect("/perfil?tab=settings")
            .with_flash(Flash::success("Perfil actualizado correctamente")),
        Err(e) => {
            log::error!("Error updating profile {}: {}", user.id, e);
            Response::redirect("/perfil?tab=settings").with_flash(Flash::error("Error actualizando perfil"))
        }
    }
}
