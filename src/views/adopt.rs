use super::{SelectOption, cards, fail, options, render, render_with_status, require_user};
use crate::error::AppError;
use crate::listing::{self, AnimalFilter, Pagination, page_query};
use crate::models::{Animal, Sex, Size, Species};
use crate::reports::AdoptionDraft;
use crate::router::{AppState, Flash, Request, Response};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

#[derive(Serialize)]
struct FilterPill {
    label: &'static str,
    remove_query: String,
}

/// Each active filter as a pill whose link drops just that filter.
fn pills(filter: &AnimalFilter) -> Vec<FilterPill> {
    let mut out = Vec::new();
    if let Some(s) = filter.species {
        let rest = AnimalFilter { species: None, ..*filter };
        out.push(FilterPill { label: s.label(), remove_query: page_query(&rest, 1) });
    }
    if let Some(s) = filter.sex {
        let rest = AnimalFilter { sex: None, ..*filter };
        out.push(FilterPill { label: s.label(), remove_query: page_query(&rest, 1) });
    }
    if let Some(s) = filter.size {
        let rest = AnimalFilter { size: None, ..*filter };
        out.push(FilterPill { label: s.label(), remove_query: page_query(&rest, 1) });
    }
    out
}

/// Adoptable grid with filters and pagination.
pub async fn index(req: Request, state: AppState) -> Response {
    let filter = AnimalFilter::from_query(&req.query);
    let pagination = Pagination::from_query(&req.query, state.settings.page_size);

    let page = match listing::list_adoptable(&state.db, &filter, pagination).await {
        Ok(page) => page,
        Err(e) => return fail(&state, &req, e, "/"),
    };

    let data = json!({
        "animals": cards(&page.items),
        "has_filters": !filter.is_empty(),
        "pills": pills(&filter),
        "species_options": options(&Species::ALL, filter.species, Species::as_str, Species::label),
        "sex_options": options(&Sex::ALL, filter.sex, Sex::as_str, Sex::label),
        "size_options": options(&Size::ALL, filter.size, Size::as_str, Size::label),
        "page": page.page,
        "total": page.total,
        "total_pages": page.total_pages,
        "has_prev": page.has_prev(),
        "has_next": page.has_next(),
        "prev_query": page_query(&filter, page.page.saturating_sub(1)),
        "next_query": page_query(&filter, page.page + 1),
    });
    render(&state, &req, "adopta.html", &data)
}

#[derive(Serialize)]
pub(crate) struct AnimalFormOptions {
    species_options: Vec<SelectOption>,
    sex_options: Vec<SelectOption>,
    size_options: Vec<SelectOption>,
}

pub(crate) fn form_options(form: &HashMap<String, String>) -> AnimalFormOptions {
    let pick = |key: &str| form.get(key).map(String::as_str).unwrap_or("");
    AnimalFormOptions {
        species_options: options(&Species::ALL, Species::parse(pick("species")), Species::as_str, Species::label),
        sex_options: options(&Sex::ALL, Sex::parse(pick("sex")), Sex::as_str, Sex::label),
        size_options: options(&Size::ALL, Size::parse(pick("size")), Size::as_str, Size::label),
    }
}

fn form_page(state: &AppState, req: &Request, form: &HashMap<String, String>, error: Option<String>) -> Response {
    let status = if error.is_some() { 400 } else { 200 };
    let data = json!({
        "form": form,
        "choices": form_options(form),
        "photo_required": true,
        "error": error,
    });
    render_with_status(state, req, "adopta_nueva.html", &data, status)
}

pub async fn new_form(req: Request, state: AppState) -> Response {
    let mut defaults = HashMap::new();
    defaults.insert("species".to_string(), "dog".to_string());
    defaults.insert("sex".to_string(), "male".to_string());
    defaults.insert("size".to_string(), "medium".to_string());
    form_page(&state, &req, &defaults, None)
}

/// Publish an adoption listing owned by the current user.
pub async fn create(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let form = req.form();

    let new = match AdoptionDraft::from_form(&form).validate(&user.id) {
        Ok(new) => new,
        Err(AppError::Validation(msg)) => return form_page(&state, &req, &form, Some(msg)),
        Err(e) => return fail(&state, &req, e, "/adopta/nueva"),
    };

    match Animal::create(&state.db, &new).await {
        Ok(_) => Response::redirect("/adopta")
            .with_flash(Flash::success("¡Mascota publicada para adopción!")),
        Err(e) => {
            log::error!("Error publishing adoption listing: {}", e);
            form_page(&state, &req, &form, Some("Error al publicar mascota.".into()))
        }
    }
}
