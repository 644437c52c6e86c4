use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ReconciliationConfig;
use crate::models::{ExcludedInvoice, MatchMethod, MatchResult, UnmatchedInvoice, UnmatchedOrder};

/// 质量等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl Grade {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            Self::A
        } else if score >= 80.0 {
            Self::B
        } else if score >= 70.0 {
            Self::C
        } else if score >= 60.0 {
            Self::D
        } else {
            Self::F
        }
    }

    pub fn assessment(&self) -> &'static str {
        match self {
            Self::A => "Excellent",
            Self::B => "Very good",
            Self::C => "Fair",
            Self::D => "Passable",
            Self::F => "Insufficient",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    pub score: f64,
    pub grade: Grade,
    pub assessment: String,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub total_invoice_amount: f64,
    pub total_order_amount: f64,
    pub difference: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscrepancyAnalysis {
    pub total_discrepancy: f64,
    pub average_discrepancy: f64,
    pub max_discrepancy: f64,
    pub min_discrepancy: f64,
}

impl DiscrepancyAnalysis {
    pub fn from_results(discrepancies: &[MatchResult]) -> Option<Self> {
        if discrepancies.is_empty() {
            return None;
        }
        let amounts: Vec<f64> = discrepancies
            .iter()
            .map(|d| d.differences.amount_difference)
            .collect();
        let total: f64 = amounts.iter().sum();
        Some(Self {
            total_discrepancy: total,
            average_discrepancy: total / amounts.len() as f64,
            max_discrepancy: amounts.iter().copied().fold(f64::MIN, f64::max),
            min_discrepancy: amounts.iter().copied().fold(f64::MAX, f64::min),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationSummary {
    pub total_invoices: usize,
    pub total_orders: usize,
    pub perfect_matches: usize,
    pub discrepancies: usize,
    pub unmatched_invoice_count: usize,
    pub unmatched_order_count: usize,
    pub matching_rate: f64,
    pub discrepancy_rate: f64,
    pub coverage_rate: f64,
    pub total_amount: f64,
    pub total_discrepancy_amount: f64,
    pub quality_assessment: QualityAssessment,
}

/// 每种方式的命中数与平均置信度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MethodStats {
    pub count: usize,
    pub avg_confidence: f64,
}

impl MethodStats {
    pub fn record(&mut self, confidence: f64) {
        self.count += 1;
        self.avg_confidence += (confidence - self.avg_confidence) / self.count as f64;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub processing_time_seconds: f64,
    pub reconciled_at: DateTime<Utc>,
    pub engine_version: String,
    pub config_used: ReconciliationConfig,
    pub method_performance: BTreeMap<MatchMethod, MethodStats>,
    pub orphan_lines: usize,
    pub invalid_lines: usize,
    pub interrupted: bool,
    /// 输入校验失败时的原因 (此时结果为空壳)
    pub input_error: Option<String>,
}

/// 一次对账的完整输出
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub matches: Vec<MatchResult>,
    pub discrepancies: Vec<MatchResult>,
    pub unmatched_invoices: Vec<UnmatchedInvoice>,
    pub unmatched_orders: Vec<UnmatchedOrder>,
    pub excluded_invoices: Vec<ExcludedInvoice>,
    pub totals: Totals,
    pub discrepancy_analysis: Option<DiscrepancyAnalysis>,
    pub summary: ReconciliationSummary,
    pub metadata: RunMetadata,
}
