mod common;

use adopta::models::{Animal, AnimalStatus, Favorite, Profile, Shelter};
use adopta::orm::apply_migration_files;
use adopta::reports::{MISSING_LOCATION, MISSING_PHOTO};
use adopta::router::{FLASH_COOKIE, Request};
use common::{FakeGateway, TestApp, animal_count, as_user, insert_animal, location, new_animal};
use serde_json::json;

/// The `name=value` part of the first Set-Cookie header for `name`.
fn cookie_value(resp: &adopta::router::Response, name: &str) -> Option<String> {
    resp.cookies().into_iter().find_map(|c| {
        let pair = c.split(';').next()?;
        let (k, v) = pair.split_once('=')?;
        (k == name).then(|| v.to_string())
    })
}

// ========== Browsing ==========

#[tokio::test]
async fn test_home_shows_featured_animals() {
    let app = TestApp::new().await;
    insert_animal(&app.db, new_animal("Luna", AnimalStatus::Adoptable, None)).await;
    insert_animal(&app.db, new_animal("Rex", AnimalStatus::Adopted, None)).await;

    let resp = app.send(Request::get("/")).await;
    assert_eq!(resp.status_code, 200);
    let body = resp.body_text();
    assert!(body.contains("AdoptaMendoza"));
    assert!(body.contains("Luna"));
    assert!(!body.contains("Rex"));
}

#[tokio::test]
async fn test_adopt_grid_paginates_and_filters() {
    let app = TestApp::new().await;
    for name in ["Luna", "Toby", "Milo"] {
        insert_animal(&app.db, new_animal(name, AnimalStatus::Adoptable, None)).await;
    }
    let mut cat = new_animal("Michi", AnimalStatus::Adoptable, None);
    cat.species = adopta::models::Species::Cat;
    insert_animal(&app.db, cat).await;

    let body = app.send(Request::get("/adopta")).await.body_text();
    assert!(body.contains("Michi"));
    assert!(body.contains("Milo"));
    assert!(!body.contains("Luna"));
    assert!(body.contains("Página 1 de 2"));

    let body = app.send(Request::get("/adopta?page=2")).await.body_text();
    assert!(body.contains("Luna"));
    assert!(body.contains("Toby"));

    let body = app.send(Request::get("/adopta?species=cat")).await.body_text();
    assert!(body.contains("Michi"));
    assert!(!body.contains("Milo"));
}

#[tokio::test]
async fn test_stories_list_adopted_animals() {
    let app = TestApp::new().await;
    insert_animal(&app.db, new_animal("Rex", AnimalStatus::Adopted, None)).await;
    let body = app.send(Request::get("/historias")).await.body_text();
    assert!(body.contains("Rex"));
}

#[tokio::test]
async fn test_unknown_paths_and_animals_are_404() {
    let app = TestApp::new().await;
    assert_eq!(app.send(Request::get("/no-existe")).await.status_code, 404);

    let resp = app.send(Request::get("/mascotas/no-existe")).await;
    assert_eq!(resp.status_code, 404);
    assert!(resp.body_text().contains("No encontramos lo que buscabas"));
}

#[tokio::test]
async fn test_detail_contact_falls_back_to_owner_profile() {
    let app = TestApp::new().await;
    let (owner, _) = app.user("dueno@example.com").await;
    Profile::update_contact(&app.db, &owner, "Ana Pérez", "+54 9 261 555-1234")
        .await
        .unwrap();
    let animal = insert_animal(&app.db, new_animal("Luna", AnimalStatus::Adoptable, Some(&owner))).await;

    let resp = app.send(Request::get(&format!("/mascotas/{}", animal.id))).await;
    assert_eq!(resp.status_code, 200);
    let body = resp.body_text();
    assert!(body.contains("Ana Pérez"));
    assert!(body.contains("https://wa.me/5492615551234?text="));
    assert!(body.contains("facebook.com/sharer"));
}

#[tokio::test]
async fn test_detail_without_contact_uses_site_default() {
    let app = TestApp::new().await;
    let animal = insert_animal(&app.db, new_animal("Luna", AnimalStatus::Adoptable, None)).await;
    let body = app
        .send(Request::get(&format!("/mascotas/{}", animal.id)))
        .await
        .body_text();
    assert!(body.contains("Anunciante"));
    assert!(body.contains("https://wa.me/549261000000?text="));
}

#[tokio::test]
async fn test_shelters_pages() {
    let app = TestApp::new().await;
    apply_migration_files(app.db.clone(), "migrations").await.unwrap();
    let shelters = Shelter::list(&app.db).await.unwrap();

    let body = app.send(Request::get("/refugios")).await.body_text();
    for s in &shelters {
        assert!(body.contains(&s.name));
    }

    let mut listed = new_animal("Pelusa", AnimalStatus::Adoptable, None);
    listed.shelter_id = Some(shelters[0].id.clone());
    insert_animal(&app.db, listed).await;

    let resp = app.send(Request::get(&format!("/refugios/{}", shelters[0].id))).await;
    assert_eq!(resp.status_code, 200);
    assert!(resp.body_text().contains("Pelusa"));
    assert_eq!(app.send(Request::get("/refugios/nada")).await.status_code, 404);
}

#[tokio::test]
async fn test_map_draws_photo_pins_with_detail_links() {
    let app = TestApp::configured(FakeGateway::default(), |s| {
        s.maps_api_key = "maps-key".into();
    })
    .await;
    let mut lost = new_animal("Toby", AnimalStatus::Lost, None);
    lost.last_seen = Some((-32.89, -68.84));
    insert_animal(&app.db, lost).await;

    let body = app.send(Request::get("/encontra")).await.body_text();
    assert!(body.contains("maps/api/js?key=maps-key"));
    assert!(body.contains("google.maps.OverlayView"));
    assert!(body.contains("Ver detalle"));
    assert!(body.contains(r#""photo":"/media/pets/animals/toby.jpg""#));
}

// ========== Publishing ==========

#[tokio::test]
async fn test_publishing_requires_login() {
    let app = TestApp::new().await;
    let resp = app.send(Request::get("/adopta/nueva")).await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/login?next=%2Fadopta%2Fnueva");

    let resp = app.send(Request::get("/perfil?tab=settings")).await;
    assert_eq!(location(&resp), "/login?next=%2Fperfil%3Ftab%3Dsettings");
}

#[tokio::test]
async fn test_expired_session_is_treated_as_anonymous() {
    let app = TestApp::new().await;
    let (_, token) = app.user("dueno@example.com").await;
    sqlx::query("UPDATE sessions SET created_at = '2001-01-01T00:00:00Z' WHERE token = ?")
        .bind(&token)
        .execute(app.db.pool())
        .await
        .unwrap();

    let resp = app.send(as_user(Request::get("/perfil"), &token)).await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/login?next=%2Fperfil");
}

#[tokio::test]
async fn test_adoption_listing_flow_with_flash() {
    let app = TestApp::new().await;
    let (_, token) = app.user("dueno@example.com").await;

    let resp = app
        .send(as_user(
            Request::post("/adopta/nueva").with_form(&[
                ("name", "Luna"),
                ("species", "cat"),
                ("sex", "female"),
                ("age_years", "1"),
                ("photo_url", "/media/pets/animals/luna.jpg"),
            ]),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/adopta");
    assert_eq!(animal_count(&app.db).await, 1);

    let flash = cookie_value(&resp, FLASH_COOKIE).unwrap();
    let next = app
        .send(as_user(Request::get("/adopta"), &token).with_cookie(FLASH_COOKIE, &flash))
        .await;
    let body = next.body_text();
    assert!(body.contains("¡Mascota publicada para adopción!"));
    assert!(body.contains("Luna"));
    assert_eq!(cookie_value(&next, FLASH_COOKIE).as_deref(), Some(""));
}

#[tokio::test]
async fn test_listing_forms_lock_their_submit_button() {
    let app = TestApp::new().await;
    let (_, token) = app.user("dueno@example.com").await;

    for path in ["/adopta/nueva", "/encontra/reportar", "/encontra/avistamiento"] {
        let body = app.send(as_user(Request::get(path), &token)).await.body_text();
        assert!(body.contains("data-submit-label="), "{}", path);
        assert!(body.contains("form.dataset.uploading = '1'"), "{}", path);
        assert!(body.contains("addEventListener('submit'"), "{}", path);
    }
}

#[tokio::test]
async fn test_invalid_adoption_rerenders_without_writing() {
    let app = TestApp::new().await;
    let (_, token) = app.user("dueno@example.com").await;

    let resp = app
        .send(as_user(
            Request::post("/adopta/nueva").with_form(&[("name", "Luna")]),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 400);
    let body = resp.body_text();
    assert!(body.contains(MISSING_PHOTO));
    assert!(body.contains("value=\"Luna\""));
    assert_eq!(animal_count(&app.db).await, 0);
}

#[tokio::test]
async fn test_lost_report_and_sighting_land_on_the_map() {
    let app = TestApp::new().await;
    let (_, token) = app.user("vecino@example.com").await;

    let resp = app
        .send(as_user(
            Request::post("/encontra/reportar").with_form(&[
                ("name", "Toby"),
                ("description", "Collar rojo"),
                ("photo_url", "/media/pets/animals/toby.jpg"),
            ]),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 400);
    assert!(resp.body_text().contains(MISSING_LOCATION));
    assert_eq!(animal_count(&app.db).await, 0);

    let resp = app
        .send(as_user(
            Request::post("/encontra/reportar").with_form(&[
                ("name", "Toby"),
                ("description", "Collar rojo"),
                ("photo_url", "/media/pets/animals/toby.jpg"),
                ("lat", "-32.89"),
                ("lng", "-68.84"),
            ]),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/encontra");

    let resp = app
        .send(as_user(
            Request::post("/encontra/avistamiento").with_form(&[
                ("description", "Perro negro en la plaza"),
                ("lat", "-32.90"),
                ("lng", "-68.85"),
            ]),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 303);

    let resp = app.send(Request::get("/encontra")).await;
    assert_eq!(resp.status_code, 200);
    let body = resp.body_text();
    assert!(body.contains("Toby"));
    assert!(body.contains("AVISTAMIENTO: Perro negro en la plaza"));
    assert!(body.contains("Perdidos (1)"));
    assert!(body.contains("Encontrados (1)"));
}

// ========== Owner actions ==========

#[tokio::test]
async fn test_owner_edits_status_and_deletes() {
    let app = TestApp::new().await;
    let (owner, token) = app.user("dueno@example.com").await;
    let animal = insert_animal(&app.db, new_animal("Luna", AnimalStatus::Adoptable, Some(&owner))).await;

    let resp = app
        .send(as_user(Request::get(&format!("/mascotas/{}/editar", animal.id)), &token))
        .await;
    assert_eq!(resp.status_code, 200);
    assert!(resp.body_text().contains("value=\"2\""));

    let resp = app
        .send(as_user(
            Request::post(&format!("/mascotas/{}/editar", animal.id))
                .with_form(&[("description", "Ya está castrada")]),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/perfil");
    let stored = Animal::get(&app.db, &animal.id).await.unwrap();
    assert_eq!(stored.description, "Ya está castrada");
    assert_eq!(stored.name, "Luna");
    assert_eq!(stored.photos, animal.photos);

    let resp = app
        .send(as_user(
            Request::post(&format!("/mascotas/{}/estado", animal.id)).with_form(&[("next", "/perfil")]),
            &token,
        ))
        .await;
    assert_eq!(location(&resp), "/perfil");
    assert_eq!(
        Animal::get(&app.db, &animal.id).await.unwrap().status,
        AnimalStatus::Adopted
    );

    let resp = app
        .send(as_user(Request::post(&format!("/mascotas/{}/eliminar", animal.id)), &token))
        .await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(animal_count(&app.db).await, 0);
}

#[tokio::test]
async fn test_strangers_cannot_touch_a_listing() {
    let app = TestApp::new().await;
    let (owner, _) = app.user("dueno@example.com").await;
    let (_, stranger) = app.user("otro@example.com").await;
    let animal = insert_animal(&app.db, new_animal("Luna", AnimalStatus::Adoptable, Some(&owner))).await;

    let resp = app
        .send(as_user(
            Request::post(&format!("/mascotas/{}/editar", animal.id)).with_form(&[("name", "Robada")]),
            &stranger,
        ))
        .await;
    assert_eq!(resp.status_code, 303);
    assert!(cookie_value(&resp, FLASH_COOKIE).unwrap().starts_with("error:"));

    app.send(as_user(Request::post(&format!("/mascotas/{}/eliminar", animal.id)), &stranger))
        .await;
    let stored = Animal::get(&app.db, &animal.id).await.unwrap();
    assert_eq!(stored.name, "Luna");
}

#[tokio::test]
async fn test_favorite_toggle_flow() {
    let app = TestApp::new().await;
    let animal = insert_animal(&app.db, new_animal("Toby", AnimalStatus::Adoptable, None)).await;
    let path = format!("/favoritos/{}", animal.id);

    let resp = app.send(Request::post(&path)).await;
    assert_eq!(resp.status_code, 303);
    assert!(location(&resp).starts_with("/login?next="));

    let (user, token) = app.user("fan@example.com").await;
    let resp = app
        .send(as_user(Request::post(&path).with_form(&[("next", "/favoritos")]), &token))
        .await;
    assert_eq!(location(&resp), "/favoritos");
    assert!(Favorite::is_favorite(&app.db, &user, &animal.id).await.unwrap());

    let body = app.send(as_user(Request::get("/favoritos"), &token)).await.body_text();
    assert!(body.contains("Toby"));

    app.send(as_user(Request::post(&path), &token)).await;
    assert!(!Favorite::is_favorite(&app.db, &user, &animal.id).await.unwrap());

    let resp = app.send(as_user(Request::post("/favoritos/nada"), &token)).await;
    assert_eq!(resp.status_code, 404);
}

#[tokio::test]
async fn test_open_redirects_are_ignored() {
    let app = TestApp::new().await;
    let (_, token) = app.user("fan@example.com").await;
    let animal = insert_animal(&app.db, new_animal("Toby", AnimalStatus::Adoptable, None)).await;

    let resp = app
        .send(as_user(
            Request::post(&format!("/favoritos/{}", animal.id)).with_form(&[("next", "//evil.example")]),
            &token,
        ))
        .await;
    assert_eq!(location(&resp), format!("/mascotas/{}", animal.id));
}

// ========== Accounts ==========

#[tokio::test]
async fn test_register_signs_in_and_profile_updates() {
    let app = TestApp::new().await;
    let resp = app
        .send(Request::post("/register").with_form(&[
            ("full_name", "Ana Pérez"),
            ("email", "ana@example.com"),
            ("password", "secreto123"),
        ]))
        .await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/");
    let token = cookie_value(&resp, adopta::auth::SESSION_COOKIE).unwrap();

    let body = app.send(as_user(Request::get("/perfil"), &token)).await.body_text();
    assert!(body.contains("Hola, Ana Pérez"));

    let resp = app
        .send(as_user(
            Request::post("/perfil").with_form(&[("full_name", "Ana P."), ("phone", "261 555 0000")]),
            &token,
        ))
        .await;
    assert_eq!(location(&resp), "/perfil?tab=settings");

    let body = app
        .send(as_user(Request::get("/perfil?tab=settings"), &token))
        .await
        .body_text();
    assert!(body.contains("value=\"2615550000\""));
}

#[tokio::test]
async fn test_login_failure_and_success() {
    let app = TestApp::new().await;
    app.user("ana@example.com").await;

    let resp = app
        .send(Request::post("/login").with_form(&[
            ("email", "ana@example.com"),
            ("password", "mala"),
            ("next", "/favoritos"),
        ]))
        .await;
    assert_eq!(resp.status_code, 401);
    assert!(resp.body_text().contains("Email o contraseña incorrectos."));

    let resp = app
        .send(Request::post("/login").with_form(&[
            ("email", "ana@example.com"),
            ("password", "secreto123"),
            ("next", "/favoritos"),
        ]))
        .await;
    assert_eq!(resp.status_code, 303);
    assert_eq!(location(&resp), "/favoritos");
    let token = cookie_value(&resp, adopta::auth::SESSION_COOKIE).unwrap();

    let resp = app.send(as_user(Request::post("/logout"), &token)).await;
    assert_eq!(location(&resp), "/");
    assert_eq!(cookie_value(&resp, adopta::auth::SESSION_COOKIE).as_deref(), Some(""));
    assert_eq!(app.send(as_user(Request::get("/perfil"), &token)).await.status_code, 303);
}

// ========== Donations and API ==========

#[tokio::test]
async fn test_donate_preset_amount_shows_one_wallet() {
    let app = TestApp::new().await;
    let resp = app
        .send(Request::post("/donar").with_form(&[("amount", "2500")]))
        .await;
    assert_eq!(resp.status_code, 200);
    let body = resp.body_text();
    assert!(body.contains("preferenceId: 'pref-1'"));
    assert_eq!(body.matches("wallet_container").count(), 2);
    assert!(body.contains("Vas a donar $2.500"));

    let requests = app.gateway.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].price, 2500.0);
    assert_eq!(requests[0].quantity, 1);
}

#[tokio::test]
async fn test_donate_invalid_custom_amount() {
    let app = TestApp::new().await;
    let body = app
        .send(Request::post("/donar").with_form(&[("custom_amount", "abc")]))
        .await
        .body_text();
    assert!(body.contains("Ingresa un monto válido."));
    assert!(!body.contains("wallet_container"));
    assert!(app.gateway.requests.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_donate_gateway_failure() {
    let app = TestApp::with_gateway(FakeGateway {
        fail: true,
        ..Default::default()
    })
    .await;
    let body = app
        .send(Request::post("/donar").with_form(&[("custom_amount", "1500")]))
        .await
        .body_text();
    assert!(body.contains("Error al generar el pago. Intenta más tarde."));
    assert!(!body.contains("wallet_container"));
}

#[tokio::test]
async fn test_create_preference_endpoint() {
    let app = TestApp::new().await;
    let resp = app
        .send(Request::post("/api/create-preference").with_json(&json!({
            "title": "Donación", "quantity": 1, "price": 1000
        })))
        .await;
    assert_eq!(resp.status_code, 200);
    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body, json!({"id": "pref-1"}));

    let resp = app
        .send(Request::post("/api/create-preference").with_body("application/json", b"{".to_vec()))
        .await;
    assert_eq!(resp.status_code, 500);
    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body, json!({"error": "Error creating preference"}));
}

#[tokio::test]
async fn test_upload_and_serve_media() {
    let app = TestApp::new().await;
    let target = "/api/upload/pets?folder=animals&filename=luna.png";

    let resp = app
        .send(Request::post(target).with_body("image/png", b"png".to_vec()))
        .await;
    assert_eq!(resp.status_code, 401);

    let (_, token) = app.user("dueno@example.com").await;
    let resp = app
        .send(as_user(Request::post(target).with_body("image/png", b"png".to_vec()), &token))
        .await;
    assert_eq!(resp.status_code, 200);
    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    let url = body["url"].as_str().unwrap().to_string();
    assert_eq!(url, "/media/pets/animals/luna.png");

    let resp = app.send(Request::get(&url)).await;
    assert_eq!(resp.status_code, 200);
    assert_eq!(resp.body, b"png");
    assert!(resp.header("Cache-Control").is_some());

    let resp = app
        .send(as_user(
            Request::post(target).with_body("text/plain", b"hola".to_vec()),
            &token,
        ))
        .await;
    assert_eq!(resp.status_code, 400);
    assert_eq!(app.send(Request::get("/media/pets/animals/none.png")).await.status_code, 404);
}
