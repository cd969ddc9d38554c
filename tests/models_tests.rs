mod common;

use adopta::error::AppError;
use adopta::auth;
use adopta::models::animal::{format_age, parse_age};
use adopta::models::profile::sanitize_phone;
use adopta::models::{Animal, AnimalStatus, AnimalUpdate, Favorite, Profile, Species};
use common::{insert_animal, new_animal, test_db};

async fn account(db: &adopta::orm::Db, email: &str) -> String {
    auth::register(db, email, "secreto123", "").await.unwrap()
}

#[test]
fn test_age_text_round_trip() {
    assert_eq!(format_age(2, 0), "2 años");
    assert_eq!(format_age(1, 1), "1 año, 1 mes");
    assert_eq!(format_age(0, 5), "5 meses");
    assert_eq!(format_age(0, 0), "");
    assert_eq!(parse_age("1 año, 3 meses"), (1, 3));
    assert_eq!(parse_age("Desconocida"), (0, 0));
}

#[test]
fn test_next_resolution() {
    assert_eq!(AnimalStatus::Adoptable.next_resolution(), Some(AnimalStatus::Adopted));
    assert_eq!(AnimalStatus::Lost.next_resolution(), Some(AnimalStatus::Found));
    assert_eq!(AnimalStatus::Found.next_resolution(), None);
    assert_eq!(AnimalStatus::parse("reserved"), Some(AnimalStatus::Reserved));
    assert_eq!(AnimalStatus::parse("borrado"), None);
}

#[tokio::test]
async fn test_create_and_find_round_trips_photos() {
    let db = test_db().await;
    let owner = account(&db, "dueno@example.com").await;
    let created = insert_animal(&db, new_animal("Luna", AnimalStatus::Adoptable, Some(&owner))).await;

    let found = Animal::get(&db, &created.id).await.unwrap();
    assert_eq!(found.name, "Luna");
    assert_eq!(found.photos.first(), Some("/media/pets/animals/luna.jpg"));
    assert_eq!(found.owner_id.as_deref(), Some(owner.as_str()));
    assert!(Animal::find(&db, "missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_partial_update_keeps_untouched_fields() {
    let db = test_db().await;
    let owner = account(&db, "dueno@example.com").await;
    let animal = insert_animal(&db, new_animal("Luna", AnimalStatus::Adoptable, Some(&owner))).await;

    let changes = AnimalUpdate {
        description: Some("Muy mimosa".into()),
        species: Some(Species::Cat),
        ..Default::default()
    };
    let updated = Animal::update(&db, &animal.id, &owner, &changes).await.unwrap();

    assert_eq!(updated.description, "Muy mimosa");
    assert_eq!(updated.species, Species::Cat);
    assert_eq!(updated.name, animal.name);
    assert_eq!(updated.age_approx, animal.age_approx);
    assert_eq!(updated.photos, animal.photos);
    assert_eq!(updated.status, AnimalStatus::Adoptable);
}

#[tokio::test]
async fn test_only_the_owner_can_change_a_listing() {
    let db = test_db().await;
    let owner = account(&db, "dueno@example.com").await;
    let other = account(&db, "otro@example.com").await;
    let animal = insert_animal(&db, new_animal("Luna", AnimalStatus::Adoptable, Some(&owner))).await;

    let err = Animal::set_status(&db, &animal.id, &other, AnimalStatus::Adopted)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert!(matches!(
        Animal::delete(&db, &animal.id, &other).await,
        Err(AppError::Forbidden(_))
    ));
    assert_eq!(Animal::get(&db, &animal.id).await.unwrap().status, AnimalStatus::Adoptable);

    let resolved = Animal::set_status(&db, &animal.id, &owner, AnimalStatus::Adopted)
        .await
        .unwrap();
    assert_eq!(resolved.status, AnimalStatus::Adopted);

    Animal::delete(&db, &animal.id, &owner).await.unwrap();
    assert!(Animal::find(&db, &animal.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_favorite_toggle_twice_restores_state() {
    let db = test_db().await;
    let user = account(&db, "fan@example.com").await;
    let animal = insert_animal(&db, new_animal("Toby", AnimalStatus::Adoptable, None)).await;

    assert!(!Favorite::is_favorite(&db, &user, &animal.id).await.unwrap());
    assert!(Favorite::toggle(&db, &user, &animal.id).await.unwrap());
    assert!(Favorite::is_favorite(&db, &user, &animal.id).await.unwrap());

    let listed = Favorite::list_animals_for_user(&db, &user).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "Toby");

    assert!(!Favorite::toggle(&db, &user, &animal.id).await.unwrap());
    assert!(!Favorite::is_favorite(&db, &user, &animal.id).await.unwrap());
    assert!(Favorite::list_animals_for_user(&db, &user).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_adding_a_favorite_twice_keeps_one_row() {
    let db = test_db().await;
    let user = account(&db, "fan@example.com").await;
    let animal = insert_animal(&db, new_animal("Toby", AnimalStatus::Adoptable, None)).await;

    Favorite::add(&db, &user, &animal.id).await.unwrap();
    Favorite::add(&db, &user, &animal.id).await.unwrap();
    assert_eq!(Favorite::list_animals_for_user(&db, &user).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_map_pins_only_lost_and_found_with_coordinates() {
    let db = test_db().await;
    let mut lost = new_animal("Perdido", AnimalStatus::Lost, None);
    lost.last_seen = Some((-32.89, -68.84));
    insert_animal(&db, lost).await;
    insert_animal(&db, new_animal("SinUbicacion", AnimalStatus::Lost, None)).await;
    let mut adoptable = new_animal("Adoptable", AnimalStatus::Adoptable, None);
    adoptable.last_seen = Some((-32.9, -68.8));
    insert_animal(&db, adoptable).await;

    let pins = Animal::map_pins(&db).await.unwrap();
    assert_eq!(pins.len(), 1);
    assert_eq!(pins[0].name, "Perdido");
    assert_eq!(pins[0].lat, -32.89);
}

#[tokio::test]
async fn test_profile_contact_update_keeps_digits_only() {
    let db = test_db().await;
    let id = account(&db, "perfil@example.com").await;

    let profile = Profile::update_contact(&db, &id, "  Ana Pérez ", "+54 9 (261) 555-1234")
        .await
        .unwrap();
    assert_eq!(profile.full_name.as_deref(), Some("Ana Pérez"));
    assert_eq!(profile.phone.as_deref(), Some("5492615551234"));
    assert_eq!(profile.email.as_deref(), Some("perfil@example.com"));
    assert_eq!(profile.display_name(), Some("Ana Pérez"));
    assert_eq!(sanitize_phone("abc"), "");
}
