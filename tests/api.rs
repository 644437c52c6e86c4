use axum::body::to_bytes;
use axum::extract::{Json, State};
use axum::http::StatusCode;
use invoice_recon_rust::api::{health_check, reconcile, AppState, ReconcileRequest, ReconcileResponse};
use invoice_recon_rust::models::{RawField, RawInvoiceRecord, RawLineRecord};
use invoice_recon_rust::ReconciliationConfig;
use std::sync::Arc;
use std::time::Duration;

fn state() -> State<Arc<AppState>> {
    State(Arc::new(AppState {
        default_config: ReconciliationConfig::default(),
        run_timeout: Duration::from_secs(30),
    }))
}

async fn call(req: ReconcileRequest) -> (StatusCode, ReconcileResponse) {
    let response = reconcile(state(), Json(req)).await;
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_returns_ok() {
    assert_eq!(health_check().await, "OK");
}

#[tokio::test]
async fn reconcile_returns_result_and_diagnostics() {
    let req: ReconcileRequest = serde_json::from_value(serde_json::json!({
        "invoices": [
            {"filename": "a.pdf", "purchase_order": "5600025054", "total_net": "9,84"},
            {"filename": "b.pdf", "success": false}
        ],
        "lines": [
            {"order_number": 5600025054i64, "net_amount": "4,92", "cost_center": "X"},
            {"order_number": "5600025054.0", "net_amount": 4.92, "cost_center": "Y"}
        ]
    }))
    .unwrap();

    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.success);
    let result = body.result.unwrap();
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.excluded_invoices.len(), 1);
    assert_eq!(result.summary.matching_rate, 100.0);
    assert!(body.message.contains("1 matches"));
    assert_eq!(body.diagnostics.len(), 1);
}

#[tokio::test]
async fn invalid_config_is_bad_request() {
    let req = ReconcileRequest {
        invoices: vec![RawInvoiceRecord::default()],
        lines: vec![RawLineRecord {
            order_number: Some(RawField::from("5600025054")),
            ..Default::default()
        }],
        config: Some(ReconciliationConfig {
            fuzzy_threshold: 1.5,
            ..Default::default()
        }),
        extended_tolerance: None,
    };

    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!body.success);
    assert!(body.result.is_none());
    assert!(body.message.contains("fuzzy_threshold"));
}

#[tokio::test]
async fn extended_tolerance_flag_overrides_factor() {
    let req = ReconcileRequest {
        invoices: Vec::new(),
        lines: Vec::new(),
        config: None,
        extended_tolerance: Some(false),
    };

    let (status, body) = call(req).await;
    assert_eq!(status, StatusCode::OK);
    let result = body.result.unwrap();
    assert_eq!(result.metadata.config_used.extended_tolerance_factor, 2.0);
    assert!(result.metadata.input_error.is_some());
    assert!(body.message.starts_with("Nothing to reconcile"));
}
