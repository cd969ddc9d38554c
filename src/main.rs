use adopta::logging;
use adopta::orm::{Db, apply_migration_files, auto_migrate};
use adopta::payments::MercadoPagoGateway;
use adopta::router::AppState;
use adopta::settings::Settings;
use adopta::storage::LocalStorage;
use adopta::template::Templates;
use adopta::views::build_router;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = Settings::from_env()?;
    logging::init(settings.debug);

    let db = Arc::new(Db::connect(&settings.database_url).await?);
    auto_migrate(db.clone()).await?;
    apply_migration_files(db.clone(), &settings.migrations_dir).await?;

    if settings.payments.access_token.is_empty() {
        log::warn!("ADOPTA_MP_ACCESS_TOKEN is not set; donations will fail");
    }
    if settings.maps_api_key.is_empty() {
        log::warn!("ADOPTA_MAPS_API_KEY is not set; maps will not load");
    }

    let state = AppState {
        db,
        templates: Templates::new(&settings.template.dir),
        storage: Arc::new(LocalStorage::new(&settings.storage)),
        payments: Arc::new(MercadoPagoGateway::new(settings.payments.clone())?),
        settings: settings.clone(),
    };

    build_router(state).run(settings).await
}
