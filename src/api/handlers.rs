use crate::config::ReconciliationConfig;
use crate::models::{RawInvoiceRecord, RawLineRecord, ReconciliationResult};
use crate::service::{CancelToken, CollectingSink, Diagnostic, ReconciliationEngine};
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// 共享状态: 默认对账参数与单次运行超时
#[derive(Debug, Clone)]
pub struct AppState {
    pub default_config: ReconciliationConfig,
    pub run_timeout: Duration,
}

/// 请求体: 原始发票、原始明细、可选参数
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    #[serde(default)]
    pub invoices: Vec<RawInvoiceRecord>,
    #[serde(default)]
    pub lines: Vec<RawLineRecord>,
    #[serde(default)]
    pub config: Option<ReconciliationConfig>,
    /// "扩大容差" 开关，覆盖 extended_tolerance_factor
    #[serde(default)]
    pub extended_tolerance: Option<bool>,
}

/// 响应体
#[derive(Debug, Serialize, Deserialize)]
pub struct ReconcileResponse {
    pub success: bool,
    pub message: String,
    pub result: Option<ReconciliationResult>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ReconcileResponse {
    fn failure(message: String) -> Self {
        Self {
            success: false,
            message,
            result: None,
            diagnostics: Vec::new(),
        }
    }
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 对账接口: 引擎在阻塞线程上运行，超时后剩余发票记为未匹配
pub async fn reconcile(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ReconcileRequest>,
) -> Response {
    let mut config = req.config.unwrap_or_else(|| state.default_config.clone());
    if let Some(enabled) = req.extended_tolerance {
        config = config.with_extended_tolerance(enabled);
    }

    let engine = match ReconciliationEngine::new(config) {
        Ok(engine) => engine,
        Err(e) => {
            let response = ReconcileResponse::failure(format!("Error: {}", e));
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let timeout = state.run_timeout;
    let (invoices, lines) = (req.invoices, req.lines);
    let joined = tokio::task::spawn_blocking(move || {
        let sink = CollectingSink::new();
        let cancel = CancelToken::with_deadline(timeout);
        let result = engine.reconcile_with_cancel(invoices, lines, &sink, &cancel);
        (result, sink.into_entries())
    })
    .await;

    match joined {
        Ok((result, diagnostics)) => {
            let summary = &result.summary;
            let message = match &result.metadata.input_error {
                Some(reason) => format!("Nothing to reconcile: {}", reason),
                None => format!(
                    "Reconciled {} invoices: {} matches, {} discrepancies, {} unmatched",
                    summary.total_invoices,
                    summary.perfect_matches,
                    summary.discrepancies,
                    summary.unmatched_invoice_count
                ),
            };
            tracing::info!("{} (诊断 {} 条)", message, diagnostics.len());
            let response = ReconcileResponse {
                success: true,
                message,
                result: Some(result),
                diagnostics,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("对账任务异常退出: {}", e);
            let response = ReconcileResponse::failure(format!("Error: {}", e));
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}
