#![allow(dead_code)]

use adopta::auth;
use adopta::error::{AppError, AppResult};
use adopta::models::{Animal, AnimalStatus, NewAnimal, Photos, Sex, Size, Species};
use adopta::orm::{Db, auto_migrate};
use adopta::payments::{PaymentGateway, PreferenceRequest};
use adopta::router::{AppState, Request, Response, Router};
use adopta::settings::Settings;
use adopta::storage::{ObjectStorage, StoredObject};
use adopta::template::Templates;
use adopta::views::build_router;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub async fn test_db() -> Arc<Db> {
    let db = Arc::new(Db::connect("sqlite::memory:").await.unwrap());
    auto_migrate(db.clone()).await.unwrap();
    db
}

/// Records every preference it is asked for and answers with `pref-<n>`.
#[derive(Default)]
pub struct FakeGateway {
    pub requests: Mutex<Vec<PreferenceRequest>>,
    pub fail: bool,
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<String> {
        if self.fail {
            return Err(AppError::ExternalService("gateway down".into()));
        }
        let mut requests = self.requests.lock().unwrap();
        requests.push(request.clone());
        Ok(format!("pref-{}", requests.len()))
    }
}

/// In-memory object store.
#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, StoredObject>>,
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(
        &self,
        bucket: &str,
        folder: &str,
        filename: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> AppResult<String> {
        if !content_type.starts_with("image/") {
            return Err(AppError::InvalidInput("Solo se aceptan imágenes.".into()));
        }
        let path = format!("{}/{}/{}", bucket, folder, filename);
        self.objects.lock().unwrap().insert(
            path.clone(),
            StoredObject {
                bytes: bytes.to_vec(),
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("/media/{}", path))
    }

    async fn read(&self, path: &str) -> AppResult<StoredObject> {
        self.objects
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| AppError::NotFound(path.to_string()))
    }
}

/// App state backed by an in-memory database and the fakes above.
pub async fn test_state() -> AppState {
    AppState {
        db: test_db().await,
        settings: Settings::default(),
        templates: Templates::new("templates"),
        storage: Arc::new(MemoryStorage::default()),
        payments: Arc::new(FakeGateway::default()),
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Arc<Db>,
    pub gateway: Arc<FakeGateway>,
    pub storage: Arc<MemoryStorage>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_gateway(FakeGateway::default()).await
    }

    pub async fn with_gateway(gateway: FakeGateway) -> Self {
        Self::configured(gateway, |_| {}).await
    }

    /// Test settings (page size 2, a public key) adjusted by `configure`.
    pub async fn configured(gateway: FakeGateway, configure: impl FnOnce(&mut Settings)) -> Self {
        let db = test_db().await;
        let gateway = Arc::new(gateway);
        let storage = Arc::new(MemoryStorage::default());
        let mut settings = Settings::default();
        settings.page_size = 2;
        settings.payments.public_key = "TEST-public".into();
        configure(&mut settings);
        let state = AppState {
            db: db.clone(),
            settings,
            templates: Templates::new("templates"),
            storage: storage.clone(),
            payments: gateway.clone(),
        };
        TestApp {
            router: build_router(state),
            db,
            gateway,
            storage,
        }
    }

    pub async fn send(&self, req: Request) -> Response {
        self.router.dispatch(req).await
    }

    /// Register an account and return `(user_id, session_token)`.
    pub async fn user(&self, email: &str) -> (String, String) {
        let id = auth::register(&self.db, email, "secreto123", "Ana Pérez")
            .await
            .unwrap();
        let token = auth::login(&self.db, email, "secreto123", Settings::default().session_ttl)
            .await
            .unwrap();
        (id, token)
    }
}

pub fn as_user(req: Request, token: &str) -> Request {
    req.with_cookie(auth::SESSION_COOKIE, token)
}

pub fn location(resp: &Response) -> &str {
    resp.header("Location").unwrap_or_default()
}

pub fn new_animal(name: &str, status: AnimalStatus, owner: Option<&str>) -> NewAnimal {
    NewAnimal {
        name: name.to_string(),
        species: Species::Dog,
        breed: String::new(),
        sex: Sex::Male,
        age_approx: "2 años".to_string(),
        size: Some(Size::Medium),
        description: format!("{} busca familia", name),
        medical_notes: String::new(),
        photos: Photos(vec![format!("/media/pets/animals/{}.jpg", name.to_lowercase())]),
        status,
        last_seen: None,
        owner_id: owner.map(str::to_string),
        shelter_id: None,
    }
}

pub async fn insert_animal(db: &Db, new: NewAnimal) -> Animal {
    Animal::create(db, &new).await.unwrap()
}

pub async fn animal_count(db: &Db) -> i64 {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM animals")
        .fetch_one(db.pool())
        .await
        .unwrap();
    n
}
