use thiserror::Error;

/// 对账引擎错误
///
/// 运行期间的记录级错误只会被记录到诊断输出，不会中断整个对账；
/// 只有配置校验和外层 I/O 会以 `Err` 返回给调用方。
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("invalid reconciliation config: {0}")]
    InvalidConfig(String),

    #[error("invoice '{source_id}': extraction failed upstream")]
    ExtractionFailed { source_id: String },

    #[error("invoice '{source_id}' excluded: {reason}")]
    IneligibleInvoice { source_id: String, reason: String },

    #[error("line {position}: {reason}")]
    MalformedLine { position: usize, reason: String },

    #[error("invoice '{source_id}': invalid amount {value}")]
    InvalidAmount { source_id: String, value: f64 },

    #[error("invoice '{source_id}' vs order '{order_number}': {message}")]
    Scoring {
        source_id: String,
        order_number: String,
        message: String,
    },

    #[error("config load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
