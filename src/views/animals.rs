use super::adopt::form_options;
use super::{cards, fail, not_found_page, render, render_with_status, require_user, safe_next};
use crate::error::AppError;
use crate::geo::DEFAULT_CENTER;
use crate::models::animal::{AnimalDetail, parse_age};
use crate::models::{Animal, AnimalStatus, Favorite, Profile};
use crate::models::profile::sanitize_phone;
use crate::reports::EditDraft;
use crate::router::{AppState, Flash, Request, Response};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

pub const DEFAULT_CONTACT_PHONE: &str = "549261000000";
pub const DEFAULT_CONTACT_NAME: &str = "Anunciante";

/// Who a visitor reaches when they ask about an animal.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Contact {
    pub name: String,
    pub phone: String,
    pub is_shelter: bool,
    pub address: Option<String>,
    pub website: Option<String>,
}

fn non_empty(v: &Option<String>) -> Option<String> {
    v.as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Shelter first, then the owner's profile, then the site default.
pub fn resolve_contact(detail: &AnimalDetail, owner: Option<&Profile>) -> Contact {
    let is_shelter = detail.shelter_name.is_some();
    let owner_name = owner.and_then(|p| non_empty(&p.full_name));
    let owner_phone = owner.and_then(|p| non_empty(&p.phone));

    let name = non_empty(&detail.shelter_name)
        .or(owner_name)
        .unwrap_or_else(|| DEFAULT_CONTACT_NAME.to_string());
    let phone = non_empty(&detail.shelter_phone)
        .or(owner_phone)
        .map(|p| sanitize_phone(&p))
        .filter(|p| !p.is_empty())
        .unwrap_or_else(|| DEFAULT_CONTACT_PHONE.to_string());

    Contact {
        name,
        phone,
        is_shelter,
        address: non_empty(&detail.shelter_address),
        website: non_empty(&detail.shelter_website),
    }
}

pub fn whatsapp_link(phone: &str, animal_name: &str) -> String {
    let message = format!(
        "Hola, estoy interesado en adoptar a {} que vi en AdoptaMendoza Web.",
        animal_name
    );
    format!("https://wa.me/{}?text={}", phone, urlencoding::encode(&message))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ShareLinks {
    pub whatsapp: String,
    pub facebook: String,
    pub url: String,
}

pub fn share_links(page_url: &str, title: &str, text: &str) -> ShareLinks {
    let message = format!("{}\n{}\n{}", title, text, page_url);
    ShareLinks {
        whatsapp: format!("https://wa.me/?text={}", urlencoding::encode(&message)),
        facebook: format!(
            "https://www.facebook.com/sharer/sharer.php?u={}",
            urlencoding::encode(page_url)
        ),
        url: page_url.to_string(),
    }
}

/// Animal detail with contact, share and favorite controls.
pub async fn detail(req: Request, state: AppState) -> Response {
    let id = req.param("id").unwrap_or_default().to_string();
    let detail = match Animal::find_detail(&state.db, &id).await {
        Ok(Some(d)) => d,
        Ok(None) => return not_found_page(&state, &req),
        Err(e) => return fail(&state, &req, e, "/adopta"),
    };
    let animal = &detail.animal;

    let owner = match (&animal.owner_id, &detail.shelter_name) {
        (Some(owner_id), None) => Profile::find(&state.db, owner_id).await.unwrap_or_else(|e| {
            log::error!("Error loading owner profile for {}: {}", animal.id, e);
            None
        }),
        _ => None,
    };
    let contact = resolve_contact(&detail, owner.as_ref());

    let (is_favorite, is_owner) = match &req.user {
        Some(user) => {
            let fav = Favorite::is_favorite(&state.db, &user.id, &animal.id)
                .await
                .unwrap_or_else(|e| {
                    log::error!("Error checking favorite: {}", e);
                    false
                });
            (fav, animal.owner_id.as_deref() == Some(user.id.as_str()))
        }
        None => (false, false),
    };

    let page_url = format!("{}/mascotas/{}", state.settings.site_url, animal.id);
    let share_text: String = animal.description.chars().take(140).collect();
    let next = animal.status.next_resolution();

    let data = json!({
        "animal": {
            "id": animal.id,
            "name": animal.name,
            "breed": animal.breed,
            "species_label": animal.species.label(),
            "sex_label": animal.sex.label(),
            "size_label": animal.size.map(|s| s.label()).unwrap_or(""),
            "age": animal.age_approx,
            "description": animal.description,
            "medical_notes": animal.medical_notes,
            "status": animal.status.as_str(),
            "status_label": animal.status.label(),
            "is_adoptable": animal.status == AnimalStatus::Adoptable,
            "photo": animal.photos.first(),
            "gallery": animal.photos.0.iter().skip(1).take(4).collect::<Vec<_>>(),
            "has_location": animal.last_seen_lat.is_some() && animal.last_seen_long.is_some(),
            "lat": animal.last_seen_lat,
            "lng": animal.last_seen_long,
        },
        "contact": contact,
        "whatsapp_url": whatsapp_link(&contact.phone, &animal.name),
        "share": share_links(&page_url, &animal.name, &share_text),
        "is_favorite": is_favorite,
        "is_owner": is_owner,
        "next_status": next.map(|s| s.as_str()),
        "next_status_label": next.map(|s| s.label()),
    });
    render(&state, &req, "mascota.html", &data)
}

fn edit_values(animal: &Animal) -> HashMap<String, String> {
    let (years, months) = parse_age(&animal.age_approx);
    let mut form = HashMap::new();
    form.insert("name".to_string(), animal.name.clone());
    form.insert("species".to_string(), animal.species.as_str().to_string());
    form.insert("breed".to_string(), animal.breed.clone());
    form.insert("sex".to_string(), animal.sex.as_str().to_string());
    form.insert(
        "size".to_string(),
        animal.size.map(|s| s.as_str()).unwrap_or("medium").to_string(),
    );
    form.insert("age_years".to_string(), years.to_string());
    form.insert("age_months".to_string(), months.to_string());
    form.insert("description".to_string(), animal.description.clone());
    form.insert("medical_notes".to_string(), animal.medical_notes.clone());
    if let (Some(lat), Some(lng)) = (animal.last_seen_lat, animal.last_seen_long) {
        form.insert("lat".to_string(), lat.to_string());
        form.insert("lng".to_string(), lng.to_string());
    }
    form
}

fn edit_page(
    state: &AppState,
    req: &Request,
    animal: &Animal,
    form: &HashMap<String, String>,
    error: Option<String>,
) -> Response {
    let status = if error.is_some() { 400 } else { 200 };
    let data = json!({
        "animal_id": animal.id,
        "form": form,
        "choices": form_options(form),
        "photo": animal.photos.first(),
        "is_adoptable": animal.status == AnimalStatus::Adoptable,
        "is_report": matches!(animal.status, AnimalStatus::Lost | AnimalStatus::Found),
        "photo_required": false,
        "maps_api_key": state.settings.maps_api_key,
        "has_maps_key": !state.settings.maps_api_key.is_empty(),
        "center": DEFAULT_CENTER,
        "error": error,
    });
    render_with_status(state, req, "mascota_editar.html", &data, status)
}

pub async fn edit_form(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = req.param("id").unwrap_or_default();
    match Animal::get_owned(&state.db, id, &user.id).await {
        Ok(animal) => edit_page(&state, &req, &animal, &edit_values(&animal), None),
        Err(e) => fail(&state, &req, e, "/"),
    }
}

/// Apply the edit form. Fields the form does not carry keep their stored values.
pub async fn update(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = req.param("id").unwrap_or_default().to_string();
    let current = match Animal::get_owned(&state.db, &id, &user.id).await {
        Ok(a) => a,
        Err(e) => return fail(&state, &req, e, "/"),
    };

    let form = req.form();
    let changes = match EditDraft::from_form(&form).validate(current.status) {
        Ok(c) => c,
        Err(AppError::Validation(msg)) => {
            return edit_page(&state, &req, &current, &form, Some(msg));
        }
        Err(e) => return fail(&state, &req, e, &format!("/mascotas/{}/editar", id)),
    };

    match Animal::update(&state.db, &id, &user.id, &changes).await {
        Ok(_) => Response::redirect("/perfil").with_flash(Flash::success("¡Publicación actualizada!")),
        Err(e) => {
            log::error!("Error updating listing {}: {}", id, e);
            edit_page(&state, &req, &current, &form, Some("Error al actualizar.".into()))
        }
    }
}

/// Move a listing to its resolved state, or to an explicit `status` field.
pub async fn change_status(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = req.param("id").unwrap_or_default().to_string();
    let form = req.form();
    let back = safe_next(form.get("next").map(String::as_str), "/perfil");

    let current = match Animal::get_owned(&state.db, &id, &user.id).await {
        Ok(a) => a,
        Err(e) => return fail(&state, &req, e, &back),
    };
    let target = match form.get("status").map(|s| s.trim()).filter(|s| !s.is_empty()) {
        Some(raw) => AnimalStatus::parse(raw),
        None => current.status.next_resolution(),
    };
    let Some(target) = target else {
        return Response::redirect(back).with_flash(Flash::error("No se pudo actualizar el estado"));
    };

    match Animal::set_status(&state.db, &id, &user.id, target).await {
        Ok(_) => Response::redirect(back).with_flash(Flash::success("Estado actualizado")),
        Err(e) => {
            log::error!("Error changing status of {}: {}", id, e);
            Response::redirect(back).with_flash(Flash::error("No se pudo actualizar el estado"))
        }
    }
}

pub async fn delete(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    let id = req.param("id").unwrap_or_default().to_string();
    match Animal::delete(&state.db, &id, &user.id).await {
        Ok(()) => Response::redirect("/perfil").with_flash(Flash::success("Publicación eliminada")),
        Err(e @ (AppError::Forbidden(_) | AppError::NotFound(_))) => fail(&state, &req, e, "/perfil"),
        Err(e) => {
            log::error!("Error deleting listing {}: {}", id, e);
            Response::redirect("/perfil").with_flash(Flash::error("No se pudo eliminar"))
        }
    }
}

pub async fn favorites(req: Request, state: AppState) -> Response {
    let user = match require_user(&req) {
        Ok(u) => u,
        Err(resp) => return resp,
    };
    match Favorite::list_animals_for_user(&state.db, &user.id).await {
        Ok(items) => render(&state, &req, "favoritos.html", &json!({ "animals": cards(&items) })),
        Err(e) => fail(&state, &req, e, "/"),
    }
}

/// Add or remove a favorite, then go back to `next`.
pub async fn toggle_favorite(req: Request, state: AppState) -> Response {
    let id = req.param("id").unwrap_or_default().to_string();
    let form = req.form();
    let back = safe_next(
        form.get("next").map(String::as_str),
        &format!("/mascotas/{}", id),
    );

    let Some(user) = req.user.clone() else {
        return Response::redirect(format!("/login?next={}", urlencoding::encode(&back)))
            .with_flash(Flash::error("Inicia sesión para guardar favoritos"));
    };

    match Animal::find(&state.db, &id).await {
        Ok(Some(_)) => {}
        Ok(None) => return not_found_page(&state, &req),
        Err(e) => return fail(&state, &req, e, &back),
    }

    match Favorite::toggle(&state.db, &user.id, &id).await {
        Ok(true) => Response::redirect(back).with_flash(Flash::success("Guardado en favoritos ❤️")),
        Ok(false) => Response::redirect(back).with_flash(Flash::info("Eliminado de favoritos")),
        Err(e) => {
            log::error!("Error toggling favorite {} for {}: {}", id, user.id, e);
            Response::redirect(back).with_flash(Flash::error("Error al actualizar favoritos"))
        }
    }
}
