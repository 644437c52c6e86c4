use std::str::FromStr;

use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexSet;

use crate::error::ReconError;
use crate::models::{
    ExcludedInvoice, InvoiceRecord, InvoiceReference, RawField, RawInvoiceRecord,
    RawInvoiceReference,
};
use crate::service::diagnostics::{Diagnostic, DiagnosticStage, DiagnosticsSink};

/// 订单号长度范围
const ORDER_NUMBER_MIN_LEN: usize = 8;
const ORDER_NUMBER_MAX_LEN: usize = 12;

/// 已知供应商别名 (全部关键字命中 -> 标准名称)
const KNOWN_SUPPLIERS: &[(&[&str], &str)] = &[
    (&["randstad"], "Randstad"),
    (&["select", "t.t"], "Select T.T."),
];

const DATE_FORMATS: &[&str] = &["%Y/%m/%d", "%d/%m/%Y", "%Y-%m-%d", "%d-%m-%Y", "%d.%m.%Y"];

/// 标准化订单号: 去掉数值单元格残留的 `.0`，只保留数字，长度 8~12 位
pub fn normalize_order_number(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_suffix(".0").unwrap_or(trimmed);
    let digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();
    if (ORDER_NUMBER_MIN_LEN..=ORDER_NUMBER_MAX_LEN).contains(&digits.len()) {
        Some(digits)
    } else {
        None
    }
}

pub fn normalize_order_field(raw: &RawField) -> Option<String> {
    normalize_order_number(&raw.as_text())
}

/// 清理金额文本，区分欧式 (`1.234,56`) 与美式 (`1,234.56`) 写法
///
/// 同时出现 `,` 和 `.` 时，靠后的为小数点；只有 `,` 时，其后不超过两位数字视为小数点，
/// 否则视为千分位。`1,234` 会被读成 1234，`1.234` 读成 1.234。
fn clean_amount_text(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '.' | '-'))
        .collect();

    if cleaned.is_empty() || matches!(cleaned.as_str(), "-" | "." | ",") {
        return None;
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');

    let normalized = match (last_comma, last_dot) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(comma), None) => {
            let decimals = cleaned.len() - comma - 1;
            if decimals <= 2 {
                cleaned.replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        _ => cleaned,
    };
    Some(normalized)
}

/// 文本金额 -> f64，无法解析时为 0.0
pub fn normalize_amount(raw: &str) -> f64 {
    clean_amount_text(raw)
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

pub fn normalize_amount_field(raw: &RawField) -> f64 {
    match raw {
        RawField::Int(v) => *v as f64,
        RawField::Float(v) if v.is_finite() => *v,
        RawField::Float(_) => 0.0,
        RawField::Text(s) => normalize_amount(s),
    }
}

/// 与 [`normalize_amount_field`] 同样的规则，但返回精确十进制 (用于明细累加)
pub fn normalize_amount_decimal(raw: &RawField) -> BigDecimal {
    match raw {
        RawField::Int(v) => BigDecimal::from(*v),
        RawField::Float(v) if v.is_finite() => {
            BigDecimal::from_str(&v.to_string()).unwrap_or_else(|_| BigDecimal::zero())
        }
        RawField::Float(_) => BigDecimal::zero(),
        RawField::Text(s) => {
            let Some(cleaned) = clean_amount_text(s) else {
                return BigDecimal::zero();
            };
            let Ok(value) = cleaned.parse::<f64>() else {
                return BigDecimal::zero();
            };
            BigDecimal::from_str(&cleaned)
                .or_else(|_| BigDecimal::from_str(&value.to_string()))
                .unwrap_or_else(|_| BigDecimal::zero())
        }
    }
}

/// 供应商名称: 去首尾空白、合并连续空白，已知供应商映射为标准名称
pub fn normalize_supplier(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = collapsed.to_lowercase();
    KNOWN_SUPPLIERS
        .iter()
        .find(|(needles, _)| needles.iter().all(|n| lower.contains(n)))
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or(collapsed)
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|dt| dt.date())
        })
}

/// 发票数据质量分 (字段加权)
pub fn quality_score(invoice: &InvoiceRecord) -> f64 {
    let mut score = 0.0;
    if invoice.order_number.is_some() {
        score += 0.3;
    }
    if invoice.total_net > 0.0 {
        score += 0.3;
    }
    if invoice.invoice_id.is_some() {
        score += 0.1;
    }
    if !invoice.supplier.is_empty() {
        score += 0.1;
    }
    if invoice.invoice_date.is_some() {
        score += 0.1;
    }
    if invoice.main_reference.is_some() {
        score += 0.1;
    }
    f64::min(1.0, score)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_reference(raw: &RawInvoiceReference) -> Option<InvoiceReference> {
    let batch = non_empty(raw.batch_id.clone());
    let assignment = non_empty(raw.assignment_id.clone());
    let key = non_empty(raw.reference_key.clone());

    match (batch, assignment, key) {
        (Some(b), Some(a), Some(k)) => Some(InvoiceReference {
            batch_id: b,
            assignment_id: a,
            reference_key: k,
        }),
        (Some(b), Some(a), None) => Some(InvoiceReference::new(&b, &a)),
        (batch, assignment, Some(k)) => InvoiceReference::parse(&k).or(Some(InvoiceReference {
            batch_id: batch.unwrap_or_default(),
            assignment_id: assignment.unwrap_or_default(),
            reference_key: k,
        })),
        _ => None,
    }
}

/// 单张原始发票 -> 标准化发票；不满足匹配条件时返回错误
pub fn prepare_invoice(position: usize, raw: RawInvoiceRecord) -> Result<InvoiceRecord, ReconError> {
    let source_id = non_empty(raw.source_id.clone()).unwrap_or_else(|| format!("invoice_{}", position));

    if !raw.success {
        return Err(ReconError::ExtractionFailed { source_id });
    }

    let main_reference = non_empty(raw.main_reference);

    let mut seen: IndexSet<String> = IndexSet::new();
    let mut references: Vec<InvoiceReference> = raw
        .references
        .iter()
        .filter_map(normalize_reference)
        .filter(|r| seen.insert(r.reference_key.clone()))
        .collect();
    if references.is_empty() {
        if let Some(derived) = main_reference.as_deref().and_then(InvoiceReference::parse) {
            references.push(derived);
        }
    }

    let mut invoice = InvoiceRecord {
        position,
        source_id,
        order_number: raw.purchase_order.as_ref().and_then(normalize_order_field),
        invoice_id: non_empty(raw.invoice_id.map(|v| v.as_text())),
        total_net: raw.total_net.as_ref().map(normalize_amount_field).unwrap_or(0.0),
        invoice_date: raw.invoice_date.as_deref().and_then(parse_date),
        supplier: normalize_supplier(raw.supplier.as_deref().unwrap_or_default()),
        main_reference,
        references,
        quality_score: 0.0,
    };
    invoice.quality_score = quality_score(&invoice);

    if let Some(reason) = invoice.ineligibility_reason() {
        return Err(ReconError::IneligibleInvoice {
            source_id: invoice.source_id,
            reason: reason.to_string(),
        });
    }

    Ok(invoice)
}

/// 批量准备发票: 不合格的记录被排除并记录原因，不中断处理
pub fn prepare_invoices(
    raw: Vec<RawInvoiceRecord>,
    sink: &dyn DiagnosticsSink,
) -> (Vec<InvoiceRecord>, Vec<ExcludedInvoice>) {
    let total = raw.len();
    let mut eligible = Vec::with_capacity(total);
    let mut excluded = Vec::new();

    for (position, record) in raw.into_iter().enumerate() {
        match prepare_invoice(position, record) {
            Ok(invoice) => eligible.push(invoice),
            Err(err) => {
                let source_id = match &err {
                    ReconError::ExtractionFailed { source_id }
                    | ReconError::IneligibleInvoice { source_id, .. } => source_id.clone(),
                    _ => format!("invoice_{}", position),
                };
                sink.emit(Diagnostic::warn(
                    DiagnosticStage::InvoicePreparation,
                    source_id.clone(),
                    err.to_string(),
                ));
                excluded.push(ExcludedInvoice {
                    position,
                    source_id,
                    reason: err.to_string(),
                });
            }
        }
    }

    tracing::info!("发票准备完成: {} / {} 张进入匹配", eligible.len(), total);
    (eligible, excluded)
}
