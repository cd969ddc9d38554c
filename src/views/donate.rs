use super::render;
use crate::payments::{DonationWidget, PRESET_AMOUNTS, PreferenceRequest};
use crate::router::{AppState, Request, Response};
use serde::Serialize;
use serde_json::json;

#[derive(Serialize)]
struct Tier {
    title: &'static str,
    amount: u64,
    label: String,
    selected: bool,
}

/// `10000` → `10.000`, as amounts are written in Argentina.
pub fn format_amount(amount: f64) -> String {
    let total_cents = (amount * 100.0).round() as u64;
    let digits = (total_cents / 100).to_string();
    let mut out = String::new();
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('.');
        }
        out.push(c);
    }
    let cents = total_cents % 100;
    if cents > 0 {
        out.push_str(&format!(",{:02}", cents));
    }
    out
}

fn donate_page(state: &AppState, req: &Request, widget: &DonationWidget, error: Option<&str>) -> Response {
    let tiers: Vec<Tier> = PRESET_AMOUNTS
        .iter()
        .map(|&(title, amount)| Tier {
            title,
            amount,
            label: format_amount(amount as f64),
            selected: widget.amount() == Some(amount as f64),
        })
        .collect();

    let payments = &state.settings.payments;
    let data = json!({
        "tiers": tiers,
        "custom_amount": widget.custom_input(),
        "amount_label": widget.amount().map(format_amount),
        "preference_id": widget.active_preference(),
        "public_key": payments.public_key,
        "has_public_key": !payments.public_key.is_empty(),
        "bank_alias": payments.bank_alias,
        "error": error,
    });
    render(state, req, "donar.html", &data)
}

pub async fn page(req: Request, state: AppState) -> Response {
    donate_page(&state, &req, &DonationWidget::new(), None)
}

/// Pick a preset or custom amount, create its preference and show one wallet button.
pub async fn choose_amount(req: Request, state: AppState) -> Response {
    let form = req.form();
    let mut widget = DonationWidget::new();

    let preset = form
        .get("amount")
        .and_then(|v| v.trim().parse::<f64>().ok());
    let ticket = match preset {
        Some(amount) => widget.select_amount(amount),
        None => {
            widget.edit_custom_amount(form.get("custom_amount").map(String::as_str).unwrap_or(""));
            widget.submit_custom_amount()
        }
    };
    let (Some(ticket), Some(amount)) = (ticket, widget.amount()) else {
        return donate_page(&state, &req, &widget, Some("Ingresa un monto válido."));
    };

    let request = PreferenceRequest::donation(&state.settings.payments.donation_title, amount);
    match state.payments.create_preference(&request).await {
        Ok(id) => {
            widget.preference_created(ticket, id);
            donate_page(&state, &req, &widget, None)
        }
        Err(e) => {
            log::error!("Error creating preference: {}", e);
            widget.preference_failed(ticket);
            donate_page(
                &state,
                &req,
                &widget,
                Some("Error al generar el pago. Intenta más tarde."),
            )
        }
    }
}
