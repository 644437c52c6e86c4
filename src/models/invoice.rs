use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 发票引用: 批次号 + 派工号，key 形如 `4949_65744`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceReference {
    pub batch_id: String,
    pub assignment_id: String,
    pub reference_key: String,
}

impl InvoiceReference {
    pub fn new(batch_id: &str, assignment_id: &str) -> Self {
        Self {
            batch_id: batch_id.to_string(),
            assignment_id: assignment_id.to_string(),
            reference_key: format!("{}_{}", batch_id, assignment_id),
        }
    }

    /// 从 `batch_assignment[_描述]` 形式的文本拆出引用
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().splitn(3, '_');
        let batch = parts.next()?.trim();
        let assignment = parts.next()?.trim();
        if batch.is_empty() || assignment.is_empty() {
            return None;
        }
        Some(Self::new(batch, assignment))
    }
}

/// 标准化后的发票记录，进入匹配流程后只读
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoiceRecord {
    /// 原始输入中的位置
    pub position: usize,
    pub source_id: String,
    pub order_number: Option<String>,
    pub invoice_id: Option<String>,
    pub total_net: f64,
    pub invoice_date: Option<NaiveDate>,
    pub supplier: String,
    pub main_reference: Option<String>,
    pub references: Vec<InvoiceReference>,
    pub quality_score: f64,
}

impl InvoiceRecord {
    /// 进入匹配的条件: 金额 > 0 且 (有订单号 或 有主引用)
    pub fn ineligibility_reason(&self) -> Option<&'static str> {
        if !(self.total_net > 0.0) {
            return Some("net total missing or not positive");
        }
        if self.order_number.is_none() && self.main_reference.is_none() {
            return Some("neither order number nor main reference present");
        }
        None
    }
}
