use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;

use crate::config::ReconciliationConfig;
use crate::error::ReconError;
use crate::models::{
    DiscrepancyAnalysis, Grade, MatchMethod, MatchResult, MatchType, MethodStats,
    QualityAssessment, RawInvoiceRecord, RawLineRecord, ReconciliationResult,
    ReconciliationSummary, RunMetadata, Totals, UnmatchedOrder,
};
use crate::service::aggregator::aggregate_lines;
use crate::service::cancel::CancelToken;
use crate::service::diagnostics::{Diagnostic, DiagnosticStage, DiagnosticsSink};
use crate::service::normalizer::prepare_invoices;
use crate::service::pipeline::MatchingPipeline;
use crate::service::quality::{QualityAssessor, QualityInputs};

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// 对账引擎: 一次运行 = 准备发票 -> 汇总明细 -> 分阶段匹配 -> 质量评估
pub struct ReconciliationEngine {
    config: ReconciliationConfig,
}

impl ReconciliationEngine {
    /// 配置在构造时校验
    pub fn new(config: ReconciliationConfig) -> Result<Self, ReconError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ReconciliationConfig {
        &self.config
    }

    pub fn reconcile(
        &self,
        invoices: Vec<RawInvoiceRecord>,
        lines: Vec<RawLineRecord>,
        sink: &dyn DiagnosticsSink,
    ) -> ReconciliationResult {
        self.reconcile_with_cancel(invoices, lines, sink, &CancelToken::new())
    }

    pub fn reconcile_with_cancel(
        &self,
        invoices: Vec<RawInvoiceRecord>,
        lines: Vec<RawLineRecord>,
        sink: &dyn DiagnosticsSink,
        cancel: &CancelToken,
    ) -> ReconciliationResult {
        let started = Instant::now();
        tracing::info!(
            "开始对账: {} 张发票, {} 行明细, 策略 {:?}",
            invoices.len(),
            lines.len(),
            self.config.strategy
        );

        let input_error = match (invoices.is_empty(), lines.is_empty()) {
            (true, true) => Some("no invoice records and no line records supplied"),
            (true, false) => Some("no invoice records supplied"),
            (false, true) => Some("no line records supplied"),
            (false, false) => None,
        };
        if let Some(reason) = input_error {
            tracing::warn!("输入数据为空, 返回空结果: {}", reason);
            sink.emit(Diagnostic::warn(DiagnosticStage::Input, "input", reason));
            return self.degraded(reason, started);
        }

        let (eligible, excluded_invoices) = prepare_invoices(invoices, sink);
        let aggregation = aggregate_lines(lines, sink);

        let eligible_count = eligible.len();
        let total_orders = aggregation.pool.len();
        let total_invoice_amount: f64 = eligible.iter().map(|i| i.total_net).sum();
        let total_order_amount = aggregation.pool.total_amount();

        let outcome = MatchingPipeline::new(&self.config, sink, cancel).run(eligible, aggregation.pool);

        let mut method_performance: BTreeMap<MatchMethod, MethodStats> = BTreeMap::new();
        for result in &outcome.accepted {
            method_performance
                .entry(result.method)
                .or_default()
                .record(result.confidence);
        }
        let average_confidence = if outcome.accepted.is_empty() {
            None
        } else {
            Some(outcome.accepted.iter().map(|m| m.confidence).sum::<f64>() / outcome.accepted.len() as f64)
        };

        let (matches, discrepancies): (Vec<MatchResult>, Vec<MatchResult>) = outcome
            .accepted
            .into_iter()
            .partition(|m| m.match_type == MatchType::PerfectMatch);
        let unmatched_orders: Vec<UnmatchedOrder> = outcome
            .remaining
            .into_remaining()
            .into_iter()
            .map(UnmatchedOrder::from)
            .collect();
        let discrepancy_analysis = DiscrepancyAnalysis::from_results(&discrepancies);

        let inputs = QualityInputs {
            matches: matches.len(),
            discrepancies: discrepancies.len(),
            unmatched_invoices: outcome.unmatched.len(),
            unmatched_orders: unmatched_orders.len(),
            eligible_invoices: eligible_count,
            average_confidence,
            average_discrepancy: discrepancy_analysis.as_ref().map(|d| d.average_discrepancy),
            total_amount: total_invoice_amount,
        };

        let summary = ReconciliationSummary {
            total_invoices: eligible_count,
            total_orders,
            perfect_matches: matches.len(),
            discrepancies: discrepancies.len(),
            unmatched_invoice_count: outcome.unmatched.len(),
            unmatched_order_count: unmatched_orders.len(),
            matching_rate: round2(inputs.matching_rate()),
            discrepancy_rate: round2(inputs.discrepancy_rate()),
            coverage_rate: round2(inputs.coverage_rate()),
            total_amount: round2(total_invoice_amount),
            total_discrepancy_amount: round2(
                discrepancy_analysis.as_ref().map_or(0.0, |d| d.total_discrepancy),
            ),
            quality_assessment: QualityAssessor::assess(&inputs),
        };

        let elapsed = started.elapsed().as_secs_f64();
        tracing::info!(
            "对账完成: 匹配 {}, 差异 {}, 未匹配发票 {}, 未匹配订单 {}, 耗时 {:.3}s",
            summary.perfect_matches,
            summary.discrepancies,
            summary.unmatched_invoice_count,
            summary.unmatched_order_count,
            elapsed
        );

        ReconciliationResult {
            matches,
            discrepancies,
            unmatched_invoices: outcome.unmatched,
            unmatched_orders,
            excluded_invoices,
            totals: Totals {
                total_invoice_amount: round2(total_invoice_amount),
                total_order_amount: round2(total_order_amount),
                difference: round2((total_invoice_amount - total_order_amount).abs()),
            },
            discrepancy_analysis,
            summary,
            metadata: RunMetadata {
                processing_time_seconds: elapsed,
                reconciled_at: Utc::now(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                config_used: self.config.clone(),
                method_performance,
                orphan_lines: aggregation.orphan_lines,
                invalid_lines: aggregation.invalid_lines,
                interrupted: outcome.interrupted,
                input_error: None,
            },
        }
    }

    /// 输入为空时的空壳结果
    fn degraded(&self, reason: &str, started: Instant) -> ReconciliationResult {
        ReconciliationResult {
            matches: Vec::new(),
            discrepancies: Vec::new(),
            unmatched_invoices: Vec::new(),
            unmatched_orders: Vec::new(),
            excluded_invoices: Vec::new(),
            totals: Totals::default(),
            discrepancy_analysis: None,
            summary: ReconciliationSummary {
                total_invoices: 0,
                total_orders: 0,
                perfect_matches: 0,
                discrepancies: 0,
                unmatched_invoice_count: 0,
                unmatched_order_count: 0,
                matching_rate: 0.0,
                discrepancy_rate: 0.0,
                coverage_rate: 0.0,
                total_amount: 0.0,
                total_discrepancy_amount: 0.0,
                quality_assessment: QualityAssessment {
                    score: 0.0,
                    grade: Grade::F,
                    assessment: Grade::F.assessment().to_string(),
                    recommendations: vec![format!("Provide both datasets before reconciling ({})", reason)],
                },
            },
            metadata: RunMetadata {
                processing_time_seconds: started.elapsed().as_secs_f64(),
                reconciled_at: Utc::now(),
                engine_version: env!("CARGO_PKG_VERSION").to_string(),
                config_used: self.config.clone(),
                method_performance: BTreeMap::new(),
                orphan_lines: 0,
                invalid_lines: 0,
                interrupted: false,
                input_error: Some(reason.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawField;
    use crate::service::diagnostics::CollectingSink;

    fn raw_invoice(source: &str, order: &str, amount: f64) -> RawInvoiceRecord {
        RawInvoiceRecord {
            source_id: Some(source.to_string()),
            purchase_order: Some(RawField::from(order)),
            total_net: Some(RawField::from(amount)),
            ..Default::default()
        }
    }

    fn raw_line(order: &str, amount: &str) -> RawLineRecord {
        RawLineRecord {
            order_number: Some(RawField::from(order)),
            net_amount: Some(RawField::from(amount)),
            collaborator: Some("Alice".to_string()),
            cost_center: Some("CC1".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ReconciliationConfig {
            tolerance: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            ReconciliationEngine::new(config),
            Err(ReconError::InvalidConfig(_))
        ));
    }

    #[test]
    fn empty_lines_give_degraded_result() {
        let engine = ReconciliationEngine::new(ReconciliationConfig::default()).unwrap();
        let sink = CollectingSink::new();
        let result = engine.reconcile(vec![raw_invoice("a.pdf", "5600025054", 10.0)], Vec::new(), &sink);

        assert_eq!(result.metadata.input_error.as_deref(), Some("no line records supplied"));
        assert_eq!(result.summary.total_invoices, 0);
        assert_eq!(result.summary.quality_assessment.grade, Grade::F);
        assert!(result.matches.is_empty());
        assert_eq!(sink.count_at(DiagnosticStage::Input), 1);
    }

    #[test]
    fn summary_counts_and_method_stats() {
        let engine = ReconciliationEngine::new(ReconciliationConfig::default()).unwrap();
        let sink = CollectingSink::new();
        let invoices = vec![
            raw_invoice("a.pdf", "5600025054", 100.0),
            raw_invoice("b.pdf", "5600025055", 100.0),
            raw_invoice("c.pdf", "7777777777", 5.0),
            raw_invoice("d.pdf", "5600025056", 0.0),
        ];
        let lines = vec![
            raw_line("5600025054", "60"),
            raw_line("5600025054", "40"),
            raw_line("5600025055", "110"),
            raw_line("9100000000", "999"),
        ];
        let result = engine.reconcile(invoices, lines, &sink);

        assert_eq!(result.excluded_invoices.len(), 1);
        assert_eq!(result.summary.total_invoices, 3);
        assert_eq!(result.summary.total_orders, 3);
        assert_eq!(result.matches.len(), 1);
        assert_eq!(result.discrepancies.len(), 1);
        assert_eq!(result.unmatched_invoices.len(), 1);
        assert_eq!(result.unmatched_orders.len(), 1);
        assert_eq!(result.unmatched_orders[0].order_number, "9100000000");
        assert_eq!(result.summary.matching_rate, 33.33);
        assert_eq!(result.summary.coverage_rate, 66.67);
        assert_eq!(result.summary.total_discrepancy_amount, 10.0);

        let exact = &result.metadata.method_performance[&MatchMethod::ExactOrder];
        assert_eq!(exact.count, 2);
        assert!((exact.avg_confidence - 0.95).abs() < 1e-9);
        assert_eq!(result.totals.total_invoice_amount, 205.0);
        assert_eq!(result.totals.total_order_amount, 1209.0);
        assert!(!result.metadata.interrupted);
    }
}
