use super::{cards, fail, render};
use crate::models::{Animal, AnimalStatus};
use crate::router::{AppState, Request, Response};
use serde_json::json;

pub const FEATURED_COUNT: u32 = 4;

/// Landing page with the newest adoptable animals.
pub async fn home(req: Request, state: AppState) -> Response {
    match Animal::featured(&state.db, FEATURED_COUNT).await {
        Ok(featured) => render(
            &state,
            &req,
            "home.html",
            &json!({ "featured": cards(&featured) }),
        ),
        Err(e) => {
            log::error!("Error loading featured animals: {}", e);
            render(&state, &req, "home.html", &json!({ "featured": [] }))
        }
    }
}

/// Happy endings: animals that found a home.
pub async fn stories(req: Request, state: AppState) -> Response {
    match Animal::list_by_status(&state.db, AnimalStatus::Adopted).await {
        Ok(adopted) => render(
            &state,
            &req,
            "historias.html",
            &json!({ "animals": cards(&adopted) }),
        ),
        Err(e) => fail(&state, &req, e, "/"),
    }
}
