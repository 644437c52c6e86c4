use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{InvoiceRecord, OrderAggregate};

/// 匹配分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    PerfectMatch,
    Discrepancy,
}

/// 匹配方式 (同时也是阶段，按优先级排列)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMethod {
    ExactOrder,
    ReferenceCross,
    PartialOrder,
    AmountFuzzy,
}

impl MatchMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ExactOrder => "exact_order",
            Self::ReferenceCross => "reference_cross",
            Self::PartialOrder => "partial_order",
            Self::AmountFuzzy => "amount_fuzzy",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// 单张发票在流水线中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceState {
    Unprocessed,
    AttemptedExact,
    AttemptedReference,
    AttemptedPartial,
    AttemptedAmountFuzzy,
    Matched,
    Unmatched,
}

impl InvoiceState {
    /// 某阶段尝试失败后的状态
    pub fn after_attempt(method: MatchMethod) -> Self {
        match method {
            MatchMethod::ExactOrder => Self::AttemptedExact,
            MatchMethod::ReferenceCross => Self::AttemptedReference,
            MatchMethod::PartialOrder => Self::AttemptedPartial,
            MatchMethod::AmountFuzzy => Self::AttemptedAmountFuzzy,
        }
    }
}

/// 差异优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyPriority {
    Critical,
    High,
    Medium,
    Low,
}

/// 发票引用与成本中心的命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceHit {
    pub reference_key: String,
    pub cost_center: String,
}

/// 各阶段的证据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchEvidence {
    ExactOrder {
        main_reference: Option<String>,
        reference_hits: Vec<ReferenceHit>,
        references_validated: bool,
    },
    ReferenceCross {
        reference_score: f64,
        normalized_score: f64,
        amount_confidence: f64,
        details: Vec<String>,
    },
    PartialOrder {
        similarity: f64,
        amount_confidence: f64,
    },
    AmountFuzzy {
        extended_tolerance: f64,
        base_confidence: f64,
        date_coherent: bool,
        supplier_coherent: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDifferences {
    pub amount_difference: f64,
    /// 差额占发票金额的百分比
    pub difference_percent: f64,
    pub evidence: MatchEvidence,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchMetadata {
    pub matched_at: DateTime<Utc>,
    /// 分类所用的容差 (比例)
    pub tolerance_used: f64,
    /// 接受门槛
    pub acceptance_threshold: f64,
}

/// 一次被接受的配对，创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_type: MatchType,
    pub method: MatchMethod,
    pub confidence: f64,
    pub priority: Option<DiscrepancyPriority>,
    pub invoice: InvoiceRecord,
    pub order: OrderAggregate,
    pub differences: MatchDifferences,
    pub metadata: MatchMetadata,
}

/// 未匹配发票及诊断
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedInvoice {
    pub source_id: String,
    pub order_number: Option<String>,
    pub amount: f64,
    pub invoice_id: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub supplier: String,
    pub main_reference: Option<String>,
    pub quality_score: f64,
    /// 终止前最后一次尝试的阶段状态
    pub last_state: InvoiceState,
    pub state: InvoiceState,
    pub best_attempt: Option<(MatchMethod, f64)>,
    pub reasons: Vec<String>,
    pub reason: String,
}

/// 未被认领的订单汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnmatchedOrder {
    pub order_number: String,
    pub total_amount: f64,
    pub collaborators: Vec<String>,
    pub cost_centers: Vec<String>,
    pub line_count: usize,
    pub source_files: Vec<String>,
    pub reason: String,
}

impl From<OrderAggregate> for UnmatchedOrder {
    fn from(order: OrderAggregate) -> Self {
        Self {
            order_number: order.order_number,
            total_amount: order.total_amount,
            collaborators: order.collaborators.into_iter().collect(),
            cost_centers: order.cost_centers.into_iter().collect(),
            line_count: order.line_count,
            source_files: order.source_files.into_iter().collect(),
            reason: "no invoice claimed this order".to_string(),
        }
    }
}

/// 匹配前被过滤的发票
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedInvoice {
    pub position: usize,
    pub source_id: String,
    pub reason: String,
}
