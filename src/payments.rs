//! Donations through MercadoPago Checkout Pro.
//!
//! The server creates a checkout preference and the page embeds the provider's
//! wallet button keyed by the returned preference id.
use crate::error::{AppError, AppResult};
use crate::settings::PaymentSettings;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// Preset donation tiers shown on the donate page.
pub const PRESET_AMOUNTS: [(&str, u64); 4] = [
    ("Cafecito", 1000),
    ("Refugio", 2500),
    ("Salud", 5000),
    ("Padrino", 10000),
];

pub const ITEM_ID: &str = "donation";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceRequest {
    pub title: String,
    pub quantity: u32,
    pub price: f64,
}

impl PreferenceRequest {
    pub fn donation(title: &str, price: f64) -> Self {
        PreferenceRequest {
            title: title.to_string(),
            quantity: 1,
            price,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidInput("title is required".into()));
        }
        if self.quantity == 0 {
            return Err(AppError::InvalidInput("quantity must be at least 1".into()));
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return Err(AppError::InvalidInput("price must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PreferenceResponse {
    pub id: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a checkout preference and return the provider's id for it.
    async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<String>;
}

#[derive(Serialize)]
struct PreferenceItem<'a> {
    id: &'a str,
    title: &'a str,
    quantity: u32,
    unit_price: f64,
    currency_id: &'a str,
}

#[derive(Serialize)]
struct BackUrls<'a> {
    success: &'a str,
    failure: &'a str,
    pending: &'a str,
}

#[derive(Serialize)]
struct PreferenceBody<'a> {
    items: Vec<PreferenceItem<'a>>,
    back_urls: BackUrls<'a>,
    auto_return: &'a str,
}

#[derive(Deserialize)]
struct CreatedPreference {
    id: String,
}

pub struct MercadoPagoGateway {
    client: Client,
    settings: PaymentSettings,
}

impl MercadoPagoGateway {
    pub fn new(settings: PaymentSettings) -> AppResult<Self> {
        let client = Client::builder()
            .user_agent("AdoptaMendoza/0.1")
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(MercadoPagoGateway { client, settings })
    }

    fn body<'a>(&'a self, request: &'a PreferenceRequest) -> PreferenceBody<'a> {
        let back = self.settings.back_url.as_str();
        PreferenceBody {
            items: vec![PreferenceItem {
                id: ITEM_ID,
                title: &request.title,
                quantity: request.quantity,
                unit_price: request.price,
                currency_id: &self.settings.currency,
            }],
            back_urls: BackUrls {
                success: back,
                failure: back,
                pending: back,
            },
            auto_return: "approved",
        }
    }
}

#[async_trait]
impl PaymentGateway for MercadoPagoGateway {
    async fn create_preference(&self, request: &PreferenceRequest) -> AppResult<String> {
        request.validate()?;
        if self.settings.access_token.is_empty() {
            return Err(AppError::Config("MercadoPago access token is not set".into()));
        }

        let url = format!("{}/checkout/preferences", self.settings.api_base);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.access_token)
            .json(&self.body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "MercadoPago returned {}: {}",
                status, text
            )));
        }

        let created = response.json::<CreatedPreference>().await.map_err(|e| {
            AppError::ExternalService(format!("Failed to parse MercadoPago response: {}", e))
        })?;
        log::info!(
            "Created preference {} for {} {}",
            created.id,
            request.price,
            self.settings.currency
        );
        Ok(created.id)
    }
}

/// Amount picker state for the donate page.
///
/// Every request for a preference gets a ticket. Only the answer to the latest
/// ticket becomes the widget, so there is never more than one and it always
/// carries the newest preference id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DonationWidget {
    amount: Option<f64>,
    custom_input: String,
    latest_ticket: u64,
    pending: Option<u64>,
    preference_id: Option<String>,
}

impl DonationWidget {
    pub fn new() -> Self {
        Self::default()
    }

    fn request(&mut self, amount: f64) -> u64 {
        self.amount = Some(amount);
        self.preference_id = None;
        self.latest_ticket += 1;
        self.pending = Some(self.latest_ticket);
        self.latest_ticket
    }

    /// Pick a preset tier. Returns the ticket for the preference request to issue.
    pub fn select_amount(&mut self, amount: f64) -> Option<u64> {
        if !amount.is_finite() || amount <= 0.0 {
            return None;
        }
        self.custom_input.clear();
        Some(self.request(amount))
    }

    /// Typing a custom amount hides the wallet until the amount is submitted.
    pub fn edit_custom_amount(&mut self, input: &str) {
        self.custom_input = input.to_string();
        self.amount = None;
        self.preference_id = None;
        self.pending = None;
    }

    pub fn submit_custom_amount(&mut self) -> Option<u64> {
        let value = self.custom_input.trim().parse::<f64>().ok()?;
        if !value.is_finite() || value <= 0.0 {
            return None;
        }
        Some(self.request(value))
    }

    /// Accept a created preference. Answers to stale tickets are dropped.
    pub fn preference_created(&mut self, ticket: u64, id: impl Into<String>) -> bool {
        if self.pending != Some(ticket) {
            log::debug!("Dropping stale preference for ticket {}", ticket);
            return false;
        }
        self.pending = None;
        self.preference_id = Some(id.into());
        true
    }

    pub fn preference_failed(&mut self, ticket: u64) {
        if self.pending == Some(ticket) {
            self.pending = None;
        }
    }

    pub fn amount(&self) -> Option<f64> {
        self.amount
    }

    pub fn custom_input(&self) -> &str {
        &self.custom_input
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// The preference id the single wallet button is keyed by.
    pub fn active_preference(&self) -> Option<&str> {
        self.preference_id.as_deref()
    }

    pub fn widget_count(&self) -> usize {
        usize::from(self.preference_id.is_some())
    }
}
