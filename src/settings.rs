use crate::error::{AppError, AppResult};
use chrono::Duration;
use std::collections::HashMap;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct TemplateSettings {
    pub dir: String,
}

#[derive(Clone, Debug)]
pub struct StorageSettings {
    /// Root directory uploaded objects are written under.
    pub root: String,
    /// Prefix returned in public URLs, e.g. `/media`.
    pub public_base: String,
    pub max_upload_bytes: usize,
}

#[derive(Clone, Debug)]
pub struct PaymentSettings {
    pub access_token: String,
    pub public_key: String,
    pub api_base: String,
    pub currency: String,
    /// Used for success, failure and pending redirects alike.
    pub back_url: String,
    pub donation_title: String,
    pub bank_alias: String,
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub debug: bool,
    pub host: String,
    pub port: u16,
    pub site_url: String,
    pub database_url: String,
    pub migrations_dir: String,
    pub maps_api_key: String,
    pub page_size: u32,
    /// How long a signed-in session stays valid.
    pub session_ttl: Duration,
    pub template: TemplateSettings,
    pub storage: StorageSettings,
    pub payments: PaymentSettings,
}

impl Default for Settings {
    fn default() -> Self {
        let site_url = "http://127.0.0.1:8000".to_string();
        Settings {
            debug: false,
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: "sqlite://adopta.db".to_string(),
            migrations_dir: "migrations".to_string(),
            maps_api_key: String::new(),
            page_size: 12,
            session_ttl: Duration::days(30),
            template: TemplateSettings {
                dir: "templates".to_string(),
            },
            storage: StorageSettings {
                root: "media".to_string(),
                public_base: "/media".to_string(),
                max_upload_bytes: 5 * 1024 * 1024,
            },
            payments: PaymentSettings {
                access_token: String::new(),
                public_key: String::new(),
                api_base: "https://api.mercadopago.com".to_string(),
                currency: "ARS".to_string(),
                back_url: format!("{}/donar", site_url),
                donation_title: "Donación a AdoptaMendoza".to_string(),
                bank_alias: "adopta.mendoza.mp".to_string(),
            },
            site_url,
        }
    }
}

impl Settings {
    /// Build settings from `ADOPTA_*` environment variables, loading `.env` first.
    pub fn from_env() -> AppResult<Self> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    /// Build settings from an explicit variable map. Unset keys keep their defaults.
    pub fn from_vars(vars: HashMap<String, String>) -> AppResult<Self> {
        let mut s = Settings::default();
        let get = |key: &str| vars.get(key).filter(|v| !v.trim().is_empty()).cloned();

        if let Some(v) = get("ADOPTA_DEBUG") {
            s.debug = parse_bool(&v);
        }
        if let Some(v) = get("ADOPTA_HOST") {
            s.host = v;
        }
        if let Some(v) = get("ADOPTA_PORT") {
            s.port = parse_num("ADOPTA_PORT", &v)?;
        }
        match get("ADOPTA_SITE_URL") {
            Some(v) => s.site_url = v.trim_end_matches('/').to_string(),
            None => s.site_url = format!("http://{}:{}", s.host, s.port),
        }
        s.payments.back_url = format!("{}/donar", s.site_url);

        if let Some(v) = get("ADOPTA_DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = get("ADOPTA_MIGRATIONS_DIR") {
            s.migrations_dir = v;
        }
        if let Some(v) = get("ADOPTA_MAPS_API_KEY") {
            s.maps_api_key = v;
        }
        if let Some(v) = get("ADOPTA_PAGE_SIZE") {
            let size: u32 = parse_num("ADOPTA_PAGE_SIZE", &v)?;
            if size == 0 {
                return Err(AppError::Config("ADOPTA_PAGE_SIZE must be positive".into()));
            }
            s.page_size = size;
        }
        if let Some(v) = get("ADOPTA_SESSION_TTL_SECS") {
            let secs: i64 = parse_num("ADOPTA_SESSION_TTL_SECS", &v)?;
            s.session_ttl = Duration::try_seconds(secs)
                .filter(|ttl| *ttl > Duration::zero())
                .ok_or_else(|| AppError::Config("ADOPTA_SESSION_TTL_SECS must be positive".into()))?;
        }
        if let Some(v) = get("ADOPTA_TEMPLATE_DIR") {
            s.template.dir = v;
        }
        if let Some(v) = get("ADOPTA_MEDIA_ROOT") {
            s.storage.root = v;
        }
        if let Some(v) = get("ADOPTA_MEDIA_URL") {
            s.storage.public_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ADOPTA_MAX_UPLOAD_BYTES") {
            s.storage.max_upload_bytes = parse_num("ADOPTA_MAX_UPLOAD_BYTES", &v)?;
        }
        if let Some(v) = get("ADOPTA_MP_ACCESS_TOKEN") {
            s.payments.access_token = v;
        }
        if let Some(v) = get("ADOPTA_MP_PUBLIC_KEY") {
            s.payments.public_key = v;
        }
        if let Some(v) = get("ADOPTA_MP_API_BASE") {
            s.payments.api_base = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("ADOPTA_CURRENCY") {
            s.payments.currency = v;
        }
        Ok(s)
    }

    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn parse_num<T: FromStr>(key: &str, v: &str) -> AppResult<T> {
    v.trim()
        .parse::<T>()
        .map_err(|_| AppError::Config(format!("{} has an invalid value: {}", key, v)))
}
