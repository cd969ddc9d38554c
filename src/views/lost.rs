use super::adopt::form_options;
use super::{fail, render, render_with_status, require_user};
use crate::error::AppError;
use crate::geo::{DEFAULT_CENTER, MapPin, MapView};
use crate::models::{Animal, AnimalStatus};
use crate::reports::{LostReportDraft, SightingDraft};
use crate::router::{AppState, Flash, Request, Response};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

/// JSON for an inline `<script>` block. `</` is escaped so a value cannot close the tag.
pub fn script_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|_| "null".to_string())
        .replace("</", "<\\/")
}

/// Lost/found map with its pins and initial viewport.
pub async fn map(req: Request, state: AppState) -> Response {
    let pins: Vec<MapPin> = match Animal::map_pins(&state.db).await {
        Ok(p) => p,
        Err(e) => return fail(&state, &req, e, "/"),
    };
    let view = MapView::fit(&pins);
    let lost = pins.iter().filter(|p| p.status == AnimalStatus::Lost).count();

    let data = json!({
        "pins": pins,
        "pins_json": script_json(&pins),
        "view_json": script_json(&view),
        "maps_api_key": state.settings.maps_api_key,
        "has_maps_key": !state.settings.maps_api_key.is_empty(),
        "lost_count": lost,
        "found_count": pins.len() - lost,
    });
    render(&state, &req, "encontra.html", &data)
}

fn report_page(
    state: &AppState,
    req: &Request,
    template: &str,
    form: &HashMap<String, String>,
    error: Option<String>,
) -> Response {
    let status = if error.is_some() { 400 } else { 200 };
    let data = json!({
        "form": form,
        "choices": form_options(form),
        "photo_required": template == "reportar.html",
        "maps_api_key": state.settings.maps_api_key,
        "has_maps_key": !state.settings.maps_api_key.is_empty(),
        "center": DEFAULT_CENTER,
        "error": error,
    });
    render_with_status(state, req, template, &data, status)
}

pub async fn report_form(req: Request, state: AppState) -> Response {
    report_page(&state, &req, "reportar.html", &HashMap::new(), None)
}

/// "I lost my pet": needs a photo and a map location.
pub async fn report(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let form = req.form();

    let new = match LostReportDraft::from_form(&form).validate(&user.id) {
        Ok(new) => new,
        Err(AppError::Validation(msg)) => {
            return report_page(&state, &req, "reportar.html", &form, Some(msg));
        }
        Err(e) => return fail(&state, &req, e, "/encontra/reportar"),
    };

    match Animal::create(&state.db, &new).await {
        Ok(_) => Response::redirect("/encontra")
            .with_flash(Flash::success("¡Reporte creado exitosamente!")),
        Err(e) => {
            log::error!("Error creating lost report: {}", e);
            report_page(&state, &req, "reportar.html", &form, Some("Error al crear el reporte.".into()))
        }
    }
}

pub async fn sighting_form(req: Request, state: AppState) -> Response {
    report_page(&state, &req, "avistamiento.html", &HashMap::new(), None)
}

/// "I saw a pet": only the location is required.
pub async fn sighting(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let form = req.form();

    let new = match SightingDraft::from_form(&form).validate(&user.id) {
        Ok(new) => new,
        Err(AppError::Validation(msg)) => {
            return report_page(&state, &req, "avistamiento.html", &form, Some(msg));
        }
        Err(e) => return fail(&state, &req, e, "/encontra/avistamiento"),
    };

    match Animal::create(&state.db, &new).await {
        Ok(_) => Response::redirect("/encontra")
            .with_flash(Flash::success("¡Avistamiento reportado! Gracias por ayudar.")),
        Err(e) => {
            log::error!("Error creating sighting: {}", e);
            report_page(&state, &req, "avistamiento.html", &form, Some("Error al crear reporte.".into()))
        }
    }
}
