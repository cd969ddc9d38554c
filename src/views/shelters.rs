use super::{cards, fail, not_found_page, render};
use crate::models::{Animal, Shelter};
use crate::router::{AppState, Request, Response};
use serde_json::json;

pub async fn index(req: Request, state: AppState) -> Response {
    match Shelter::list(&state.db).await {
        Ok(shelters) => render(&state, &req, "refugios.html", &json!({ "shelters": shelters })),
        Err(e) => {
            log::error!("Error fetching shelters: {}", e);
            render(&state, &req, "refugios.html", &json!({ "shelters": [] }))
        }
    }
}

/// A shelter and the animals it has up for adoption.
pub async fn detail(req: Request, state: AppState) -> Response {
    let id = req.param("id").unwrap_or_default().to_string();
    let shelter = match Shelter::find(&state.db, &id).await {
        Ok(Some(s)) => s,
        Ok(None) => return not_found_page(&state, &req),
        Err(e) => return fail(&state, &req, e, "/refugios"),
    };
    match Animal::list_for_shelter(&state.db, &shelter.id).await {
        Ok(animals) => render(
            &state,
            &req,
            "refugio.html",
            &json!({ "shelter": shelter, "animals": cards(&animals) }),
        ),
        Err(e) => fail(&state, &req, e, "/refugios"),
    }
}
