use serde::{Deserialize, Serialize};

/// 外部采集组件给出的原始字段: 可能是数字，也可能是带格式的文本
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawField {
    /// 文本形式 (数字按 Rust 默认格式输出, 5600002101.0 -> "5600002101")
    pub fn as_text(&self) -> String {
        match self {
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for RawField {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<f64> for RawField {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<i64> for RawField {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

fn default_true() -> bool {
    true
}

/// 发票引用 (批次号_派工号)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawInvoiceReference {
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub assignment_id: Option<String>,
    #[serde(default)]
    pub reference_key: Option<String>,
}

/// 扫描件提取结果 (单据识别组件输出)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawInvoiceRecord {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default, alias = "filename")]
    pub source_id: Option<String>,
    #[serde(default)]
    pub purchase_order: Option<RawField>,
    #[serde(default)]
    pub total_net: Option<RawField>,
    #[serde(default)]
    pub invoice_id: Option<RawField>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub invoice_date: Option<String>,
    #[serde(default)]
    pub main_reference: Option<String>,
    #[serde(default, alias = "invoice_references")]
    pub references: Vec<RawInvoiceReference>,
}

/// 表格明细行 (表格处理组件输出)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLineRecord {
    #[serde(default = "default_true")]
    pub is_valid: bool,
    #[serde(default)]
    pub order_number: Option<RawField>,
    #[serde(default)]
    pub net_amount: Option<RawField>,
    #[serde(default)]
    pub cost_center: Option<String>,
    #[serde(default)]
    pub collaborator: Option<String>,
    #[serde(default)]
    pub supplier: Option<String>,
    #[serde(default)]
    pub source_filename: Option<String>,
    #[serde(default)]
    pub statement_date: Option<String>,
    #[serde(default)]
    pub project: Option<String>,
}

impl Default for RawInvoiceRecord {
    fn default() -> Self {
        Self {
            success: true,
            source_id: None,
            purchase_order: None,
            total_net: None,
            invoice_id: None,
            supplier: None,
            invoice_date: None,
            main_reference: None,
            references: Vec::new(),
        }
    }
}

impl Default for RawLineRecord {
    fn default() -> Self {
        Self {
            is_valid: true,
            order_number: None,
            net_amount: None,
            cost_center: None,
            collaborator: None,
            supplier: None,
            source_filename: None,
            statement_date: None,
            project: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_field_accepts_numbers_and_text() {
        let rec: RawLineRecord = serde_json::from_str(
            r#"{"order_number": 5600002101, "net_amount": "1.234,56", "cost_center": "4949_65744"}"#,
        )
        .unwrap();
        assert_eq!(rec.order_number, Some(RawField::Int(5600002101)));
        assert_eq!(rec.net_amount, Some(RawField::Text("1.234,56".into())));
        assert!(rec.is_valid);
    }

    #[test]
    fn float_order_number_prints_without_fraction() {
        assert_eq!(RawField::Float(5600002101.0).as_text(), "5600002101");
    }

    #[test]
    fn invoice_accepts_legacy_field_names() {
        let rec: RawInvoiceRecord = serde_json::from_str(
            r#"{"filename": "a.pdf", "total_net": 9.84,
                "invoice_references": [{"batch_id": "4949", "assignment_id": "65744"}]}"#,
        )
        .unwrap();
        assert_eq!(rec.source_id.as_deref(), Some("a.pdf"));
        assert!(rec.success);
        assert_eq!(rec.references.len(), 1);
    }
}
