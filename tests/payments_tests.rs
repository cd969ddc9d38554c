use adopta::error::AppError;
use adopta::payments::*;
use adopta::settings::Settings;
use adopta::views::donate::format_amount;

#[test]
fn test_preset_tiers() {
    let amounts: Vec<u64> = PRESET_AMOUNTS.iter().map(|&(_, a)| a).collect();
    assert_eq!(amounts, vec![1000, 2500, 5000, 10000]);
}

#[test]
fn test_amount_labels() {
    assert_eq!(format_amount(1000.0), "1.000");
    assert_eq!(format_amount(10000.0), "10.000");
    assert_eq!(format_amount(1500.5), "1.500,50");
    assert_eq!(format_amount(1.999), "2");
    assert_eq!(format_amount(999.996), "1.000");
}

#[test]
fn test_preference_request_validation() {
    assert!(PreferenceRequest::donation("Donación", 2500.0).validate().is_ok());
    assert!(PreferenceRequest::donation("", 2500.0).validate().is_err());
    assert!(PreferenceRequest::donation("Donación", 0.0).validate().is_err());
    assert!(PreferenceRequest::donation("Donación", f64::NAN).validate().is_err());
    let zero_qty = PreferenceRequest {
        quantity: 0,
        ..PreferenceRequest::donation("Donación", 10.0)
    };
    assert!(zero_qty.validate().is_err());
}

#[test]
fn test_preference_request_reads_the_api_json() {
    let req: PreferenceRequest =
        serde_json::from_str(r#"{"title":"Donación","quantity":1,"price":1000}"#).unwrap();
    assert_eq!(req, PreferenceRequest::donation("Donación", 1000.0));
}

#[test]
fn test_widget_keeps_only_the_latest_preference() {
    let mut w = DonationWidget::new();
    assert_eq!(w.widget_count(), 0);

    let first = w.select_amount(1000.0).unwrap();
    let second = w.select_amount(5000.0).unwrap();
    assert!(w.is_loading());

    assert!(!w.preference_created(first, "old"));
    assert_eq!(w.active_preference(), None);

    assert!(w.preference_created(second, "new"));
    assert_eq!(w.active_preference(), Some("new"));
    assert_eq!(w.amount(), Some(5000.0));
    assert_eq!(w.widget_count(), 1);
    assert!(!w.is_loading());
}

#[test]
fn test_editing_custom_amount_hides_the_wallet() {
    let mut w = DonationWidget::new();
    let t = w.select_amount(2500.0).unwrap();
    w.preference_created(t, "pref");
    assert_eq!(w.widget_count(), 1);

    w.edit_custom_amount("300");
    assert_eq!(w.widget_count(), 0);
    assert_eq!(w.amount(), None);
    assert_eq!(w.custom_input(), "300");

    let t = w.submit_custom_amount().unwrap();
    assert_eq!(w.amount(), Some(300.0));
    w.preference_created(t, "custom");
    assert_eq!(w.active_preference(), Some("custom"));
}

#[test]
fn test_invalid_amounts_request_nothing() {
    let mut w = DonationWidget::new();
    assert_eq!(w.select_amount(0.0), None);
    assert_eq!(w.select_amount(-5.0), None);
    w.edit_custom_amount("abc");
    assert_eq!(w.submit_custom_amount(), None);
    w.edit_custom_amount("-10");
    assert_eq!(w.submit_custom_amount(), None);
    assert!(!w.is_loading());
}

#[test]
fn test_failed_request_stops_loading() {
    let mut w = DonationWidget::new();
    let t = w.select_amount(1000.0).unwrap();
    w.preference_failed(t);
    assert!(!w.is_loading());
    assert_eq!(w.widget_count(), 0);
}

#[tokio::test]
async fn test_gateway_without_token_is_a_config_error() {
    let gateway = MercadoPagoGateway::new(Settings::default().payments).unwrap();
    let err = gateway
        .create_preference(&PreferenceRequest::donation("Donación", 1000.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Config(_)));
}

#[tokio::test]
async fn test_gateway_validates_before_calling_out() {
    let mut settings = Settings::default().payments;
    settings.access_token = "TEST-token".into();
    let gateway = MercadoPagoGateway::new(settings).unwrap();
    let err = gateway
        .create_preference(&PreferenceRequest::donation("Donación", -1.0))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));
}
