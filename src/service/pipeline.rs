use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::Utc;
use rayon::prelude::*;

use crate::config::{MatchingStrategy, ReconciliationConfig};
use crate::error::ReconError;
use crate::models::{
    DiscrepancyPriority, InvoiceRecord, InvoiceReference, InvoiceState, MatchDifferences,
    MatchEvidence, MatchMetadata, MatchMethod, MatchResult, MatchType, OrderAggregate, OrderPool,
    ReferenceHit, UnmatchedInvoice,
};
use crate::service::cancel::CancelToken;
use crate::service::classifier::{
    classification_tolerance, classify, difference_percent, discrepancy_priority,
};
use crate::service::diagnostics::{Diagnostic, DiagnosticStage, DiagnosticsSink};
use crate::service::scoring::{amount_confidence, string_similarity};

/// 引用交叉匹配的最低归一化得分
const REFERENCE_MIN_SCORE: f64 = 0.4;
/// 金额模糊匹配的接受门槛
const AMOUNT_FUZZY_MIN_CONFIDENCE: f64 = 0.8;
const PARTIAL_ORDER_MIN_LEN: usize = 4;
const SUPPLIER_SIMILARITY_MIN: f64 = 0.8;
const LOW_QUALITY_SCORE: f64 = 0.5;

/// 某张发票在某个订单上的评分
#[derive(Debug, Clone)]
struct Candidate {
    order_number: String,
    confidence: f64,
    amount_diff: f64,
    evidence: MatchEvidence,
}

enum Evaluation {
    Accept(Candidate),
    /// 最佳候选未过门槛
    Reject(Candidate),
    NoCandidate,
}

/// 流水线中的发票及其尝试记录
struct PendingInvoice {
    record: InvoiceRecord,
    state: InvoiceState,
    best_attempt: Option<(MatchMethod, f64)>,
}

impl PendingInvoice {
    fn new(record: InvoiceRecord) -> Self {
        Self {
            record,
            state: InvoiceState::Unprocessed,
            best_attempt: None,
        }
    }

    fn record_rejection(&mut self, method: MatchMethod, confidence: f64) {
        let better = match self.best_attempt {
            Some((_, best)) => confidence > best,
            None => true,
        };
        if better {
            self.best_attempt = Some((method, confidence));
        }
    }
}

/// 一次流水线运行的结果
#[derive(Debug)]
pub struct PipelineOutcome {
    /// 按接受顺序排列
    pub accepted: Vec<MatchResult>,
    pub unmatched: Vec<UnmatchedInvoice>,
    /// 未被认领的订单
    pub remaining: OrderPool,
    pub interrupted: bool,
}

/// 候选排序: 置信度高者优先，其次差额小，最后订单号字典序小
fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.amount_diff.total_cmp(&b.amount_diff))
        .then_with(|| a.order_number.cmp(&b.order_number))
}

fn select_best(invoice: &InvoiceRecord, candidates: Vec<Candidate>) -> Result<Option<Candidate>, ReconError> {
    if let Some(bad) = candidates.iter().find(|c| !c.confidence.is_finite()) {
        return Err(ReconError::Scoring {
            source_id: invoice.source_id.clone(),
            order_number: bad.order_number.clone(),
            message: format!("non-finite confidence {}", bad.confidence),
        });
    }
    Ok(candidates.into_iter().min_by(rank))
}

fn contains_token(haystack: &str, token: &str) -> bool {
    !token.is_empty() && haystack.contains(token)
}

/// 单个引用与单行成本中心的得分: 完全相等 1.0，批次和分配号都包含 0.8，包含其一 0.5
fn reference_line_score(reference: &InvoiceReference, cost_center: &str) -> Option<(f64, String)> {
    let batch = contains_token(cost_center, &reference.batch_id);
    let assignment = contains_token(cost_center, &reference.assignment_id);
    if reference.reference_key == cost_center {
        Some((1.0, format!("exact: {}", reference.reference_key)))
    } else if batch && assignment {
        Some((
            0.8,
            format!("partial: {}_{}", reference.batch_id, reference.assignment_id),
        ))
    } else if batch {
        Some((0.5, format!("id: {}", reference.batch_id)))
    } else if assignment {
        Some((0.5, format!("id: {}", reference.assignment_id)))
    } else {
        None
    }
}

/// 精确匹配时的引用校验: 发票引用出现在订单成本中心中
fn reference_hits(invoice: &InvoiceRecord, order: &OrderAggregate) -> Vec<ReferenceHit> {
    let mut hits = Vec::new();
    for reference in &invoice.references {
        for cost_center in &order.cost_centers {
            let hit = contains_token(cost_center, &reference.reference_key)
                || contains_token(cost_center, &reference.batch_id)
                || contains_token(cost_center, &reference.assignment_id)
                || reference.reference_key.contains(cost_center.as_str());
            if hit {
                hits.push(ReferenceHit {
                    reference_key: reference.reference_key.clone(),
                    cost_center: cost_center.clone(),
                });
            }
        }
    }
    hits
}

/// 多阶段匹配流水线
///
/// 阶段按广度优先执行: 所有剩余发票先完成当前阶段，再进入下一阶段。
/// 候选评分在只读订单池上并行进行，认领 (从池中移除) 始终顺序执行。
pub struct MatchingPipeline<'a> {
    config: &'a ReconciliationConfig,
    sink: &'a dyn DiagnosticsSink,
    cancel: &'a CancelToken,
}

impl<'a> MatchingPipeline<'a> {
    pub fn new(
        config: &'a ReconciliationConfig,
        sink: &'a dyn DiagnosticsSink,
        cancel: &'a CancelToken,
    ) -> Self {
        Self { config, sink, cancel }
    }

    /// 按策略启用的阶段
    pub fn phases(&self) -> Vec<MatchMethod> {
        match self.config.strategy {
            MatchingStrategy::ExactOnly => vec![MatchMethod::ExactOrder],
            MatchingStrategy::ExactThenPartial => {
                vec![MatchMethod::ExactOrder, MatchMethod::PartialOrder]
            }
            MatchingStrategy::Intelligent => {
                let mut phases = vec![MatchMethod::ExactOrder];
                if self.config.enable_reference_matching {
                    phases.push(MatchMethod::ReferenceCross);
                }
                phases.push(MatchMethod::PartialOrder);
                phases.push(MatchMethod::AmountFuzzy);
                phases
            }
        }
    }

    pub fn run(&self, invoices: Vec<InvoiceRecord>, mut pool: OrderPool) -> PipelineOutcome {
        let mut pending: Vec<PendingInvoice> = invoices.into_iter().map(PendingInvoice::new).collect();
        let mut accepted = Vec::new();
        let mut claimed_by: HashMap<String, String> = HashMap::new();
        let mut interrupted = false;

        for method in self.phases() {
            if pending.is_empty() {
                break;
            }
            tracing::info!(
                "[Reconcile] 阶段 {}: 待匹配发票 {} 张, 可用订单 {} 个",
                method,
                pending.len(),
                pool.len()
            );
            let before = accepted.len();
            let mut survivors = Vec::with_capacity(pending.len());

            for mut invoice in pending {
                if !interrupted && self.cancel.is_cancelled() {
                    interrupted = true;
                    tracing::warn!("[Reconcile] 运行被取消, 剩余发票不再匹配");
                }
                if interrupted {
                    survivors.push(invoice);
                    continue;
                }

                match self.evaluate(method, &invoice.record, &pool) {
                    Ok(Evaluation::Accept(candidate)) => match pool.claim(&candidate.order_number) {
                        Some(order) => {
                            claimed_by.insert(order.order_number.clone(), invoice.record.source_id.clone());
                            accepted.push(self.build_result(method, candidate, invoice.record, order));
                            continue;
                        }
                        None => self.sink.emit(Diagnostic::warn(
                            DiagnosticStage::Matching,
                            invoice.record.source_id.clone(),
                            format!("order {} no longer available", candidate.order_number),
                        )),
                    },
                    Ok(Evaluation::Reject(candidate)) => {
                        invoice.record_rejection(method, candidate.confidence);
                    }
                    Ok(Evaluation::NoCandidate) => {}
                    Err(err) => self.sink.emit(Diagnostic::warn(
                        DiagnosticStage::Matching,
                        invoice.record.source_id.clone(),
                        format!("{} phase failed: {}", method, err),
                    )),
                }
                invoice.state = InvoiceState::after_attempt(method);
                survivors.push(invoice);
            }

            tracing::info!(
                "[Reconcile] 阶段 {} 完成: 新增匹配 {} 个",
                method,
                accepted.len() - before
            );
            pending = survivors;
        }

        let unmatched = pending
            .into_iter()
            .map(|p| self.unmatched(p, &claimed_by, interrupted))
            .collect();

        PipelineOutcome {
            accepted,
            unmatched,
            remaining: pool,
            interrupted,
        }
    }

    fn evaluate(
        &self,
        method: MatchMethod,
        invoice: &InvoiceRecord,
        pool: &OrderPool,
    ) -> Result<Evaluation, ReconError> {
        if pool.is_empty() {
            return Ok(Evaluation::NoCandidate);
        }
        match method {
            MatchMethod::ExactOrder => self.exact_order(invoice, pool),
            MatchMethod::ReferenceCross => self.reference_cross(invoice, pool),
            MatchMethod::PartialOrder => self.partial_order(invoice, pool),
            MatchMethod::AmountFuzzy => self.amount_fuzzy(invoice, pool),
        }
    }

    /// 阶段 1: 订单号完全一致即接受
    fn exact_order(&self, invoice: &InvoiceRecord, pool: &OrderPool) -> Result<Evaluation, ReconError> {
        let Some(order) = invoice.order_number.as_deref().and_then(|n| pool.get(n)) else {
            return Ok(Evaluation::NoCandidate);
        };
        let amount = invoice.total_net;
        if amount <= 0.0 {
            return Err(ReconError::InvalidAmount {
                source_id: invoice.source_id.clone(),
                value: amount,
            });
        }

        let amount_diff = (amount - order.total_amount).abs();
        let confidence = match classify(amount_diff, amount, self.config.tolerance) {
            MatchType::PerfectMatch => 1.0,
            MatchType::Discrepancy => f64::max(0.3, 1.0 - amount_diff / amount),
        };
        let hits = reference_hits(invoice, order);

        Ok(Evaluation::Accept(Candidate {
            order_number: order.order_number.clone(),
            confidence,
            amount_diff,
            evidence: MatchEvidence::ExactOrder {
                main_reference: invoice.main_reference.clone(),
                references_validated: !hits.is_empty(),
                reference_hits: hits,
            },
        }))
    }

    /// 阶段 2: 发票引用与明细成本中心交叉比对
    fn reference_cross(&self, invoice: &InvoiceRecord, pool: &OrderPool) -> Result<Evaluation, ReconError> {
        if invoice.references.is_empty() {
            return Ok(Evaluation::NoCandidate);
        }
        let reference_count = invoice.references.len() as f64;

        let candidates: Vec<Candidate> = pool
            .par_values()
            .filter_map(|order| {
                let mut score = 0.0;
                let mut details = Vec::new();
                for reference in &invoice.references {
                    for cost_center in &order.line_cost_centers {
                        if let Some((s, detail)) = reference_line_score(reference, cost_center) {
                            score += s;
                            details.push(detail);
                        }
                    }
                }
                let normalized = f64::min(1.0, score / reference_count);
                if normalized < REFERENCE_MIN_SCORE {
                    return None;
                }
                let amount_conf = amount_confidence(invoice.total_net, order.total_amount);
                Some(Candidate {
                    order_number: order.order_number.clone(),
                    confidence: 0.6 * normalized + 0.4 * amount_conf,
                    amount_diff: (invoice.total_net - order.total_amount).abs(),
                    evidence: MatchEvidence::ReferenceCross {
                        reference_score: score,
                        normalized_score: normalized,
                        amount_confidence: amount_conf,
                        details,
                    },
                })
            })
            .collect();

        self.gate(invoice, candidates, self.config.min_confidence)
    }

    /// 阶段 3: 订单号相似度
    fn partial_order(&self, invoice: &InvoiceRecord, pool: &OrderPool) -> Result<Evaluation, ReconError> {
        let Some(order_number) = invoice
            .order_number
            .as_deref()
            .filter(|n| n.len() >= PARTIAL_ORDER_MIN_LEN)
        else {
            return Ok(Evaluation::NoCandidate);
        };

        let candidates: Vec<Candidate> = pool
            .par_values()
            .filter_map(|order| {
                let similarity = string_similarity(order_number, &order.order_number);
                if similarity < self.config.fuzzy_threshold {
                    return None;
                }
                let amount_conf = amount_confidence(invoice.total_net, order.total_amount);
                Some(Candidate {
                    order_number: order.order_number.clone(),
                    confidence: 0.6 * similarity + 0.4 * amount_conf,
                    amount_diff: (invoice.total_net - order.total_amount).abs(),
                    evidence: MatchEvidence::PartialOrder {
                        similarity,
                        amount_confidence: amount_conf,
                    },
                })
            })
            .collect();

        self.gate(invoice, candidates, self.config.min_confidence)
    }

    /// 阶段 4: 扩展容差内的金额接近，日期和供应商一致时加权
    fn amount_fuzzy(&self, invoice: &InvoiceRecord, pool: &OrderPool) -> Result<Evaluation, ReconError> {
        let amount = invoice.total_net;
        let extended_tolerance = amount * self.config.tolerance * self.config.extended_tolerance_factor;
        if extended_tolerance <= 0.0 {
            return Ok(Evaluation::NoCandidate);
        }

        let candidates: Vec<Candidate> = pool
            .par_values()
            .filter_map(|order| {
                let amount_diff = (amount - order.total_amount).abs();
                if amount_diff > extended_tolerance {
                    return None;
                }
                let base_confidence = 1.0 - amount_diff / extended_tolerance;
                let date_coherent = self.dates_coherent(invoice, order);
                let supplier_coherent = suppliers_coherent(invoice, order);

                let mut confidence = base_confidence;
                if date_coherent {
                    confidence *= 1.2;
                }
                if supplier_coherent {
                    confidence *= 1.1;
                }
                Some(Candidate {
                    order_number: order.order_number.clone(),
                    confidence: f64::min(1.0, confidence),
                    amount_diff,
                    evidence: MatchEvidence::AmountFuzzy {
                        extended_tolerance,
                        base_confidence,
                        date_coherent,
                        supplier_coherent,
                    },
                })
            })
            .collect();

        self.gate(invoice, candidates, AMOUNT_FUZZY_MIN_CONFIDENCE)
    }

    fn gate(
        &self,
        invoice: &InvoiceRecord,
        candidates: Vec<Candidate>,
        threshold: f64,
    ) -> Result<Evaluation, ReconError> {
        Ok(match select_best(invoice, candidates)? {
            Some(best) if best.confidence >= threshold => Evaluation::Accept(best),
            Some(best) => Evaluation::Reject(best),
            None => Evaluation::NoCandidate,
        })
    }

    fn dates_coherent(&self, invoice: &InvoiceRecord, order: &OrderAggregate) -> bool {
        let Some(date) = invoice.invoice_date else {
            return false;
        };
        order
            .line_dates()
            .any(|d| (date - d).num_days().abs() <= self.config.date_tolerance_days)
    }

    fn acceptance_threshold(&self, method: MatchMethod) -> f64 {
        match method {
            MatchMethod::ExactOrder => 0.0,
            MatchMethod::ReferenceCross | MatchMethod::PartialOrder => self.config.min_confidence,
            MatchMethod::AmountFuzzy => AMOUNT_FUZZY_MIN_CONFIDENCE,
        }
    }

    fn build_result(
        &self,
        method: MatchMethod,
        candidate: Candidate,
        invoice: InvoiceRecord,
        order: OrderAggregate,
    ) -> MatchResult {
        let tolerance = classification_tolerance(method, self.config.tolerance);
        let match_type = classify(candidate.amount_diff, invoice.total_net, tolerance);
        let percent = difference_percent(candidate.amount_diff, invoice.total_net);
        let priority: Option<DiscrepancyPriority> = match match_type {
            MatchType::PerfectMatch => None,
            MatchType::Discrepancy => Some(discrepancy_priority(candidate.amount_diff, percent)),
        };

        tracing::debug!(
            "[Reconcile] {} -> {} ({}, 置信度 {:.3})",
            invoice.source_id,
            order.order_number,
            method,
            candidate.confidence
        );

        MatchResult {
            match_type,
            method,
            confidence: candidate.confidence,
            priority,
            invoice,
            order,
            differences: MatchDifferences {
                amount_difference: candidate.amount_diff,
                difference_percent: percent,
                evidence: candidate.evidence,
            },
            metadata: MatchMetadata {
                matched_at: Utc::now(),
                tolerance_used: tolerance,
                acceptance_threshold: self.acceptance_threshold(method),
            },
        }
    }

    fn unmatched(
        &self,
        pending: PendingInvoice,
        claimed_by: &HashMap<String, String>,
        interrupted: bool,
    ) -> UnmatchedInvoice {
        let invoice = pending.record;
        let mut reasons = Vec::new();

        match invoice.order_number.as_deref() {
            None => reasons.push("order number missing or invalid".to_string()),
            Some(n) => {
                if let Some(owner) = claimed_by.get(n) {
                    reasons.push(format!("order {} already claimed by {}", n, owner));
                }
            }
        }
        if invoice.total_net <= 0.0 {
            reasons.push("invalid or missing amount".to_string());
        }
        if invoice.quality_score < LOW_QUALITY_SCORE {
            reasons.push(format!("insufficient data quality ({:.2})", invoice.quality_score));
        }
        match pending.best_attempt {
            Some((method, confidence)) => reasons.push(format!(
                "best attempt: {} (confidence: {:.2})",
                method, confidence
            )),
            None => reasons.push("no matching candidate found".to_string()),
        }
        if interrupted {
            reasons.push("run interrupted before all phases completed".to_string());
        }

        self.sink.emit(Diagnostic::info(
            DiagnosticStage::Matching,
            invoice.source_id.clone(),
            format!("unmatched: {}", reasons.join("; ")),
        ));

        UnmatchedInvoice {
            reason: reasons.join("; "),
            source_id: invoice.source_id,
            order_number: invoice.order_number,
            amount: invoice.total_net,
            invoice_id: invoice.invoice_id,
            invoice_date: invoice.invoice_date,
            supplier: invoice.supplier,
            main_reference: invoice.main_reference,
            quality_score: invoice.quality_score,
            last_state: pending.state,
            state: InvoiceState::Unmatched,
            best_attempt: pending.best_attempt,
            reasons,
        }
    }
}

fn suppliers_coherent(invoice: &InvoiceRecord, order: &OrderAggregate) -> bool {
    if invoice.supplier.is_empty() {
        return false;
    }
    order
        .suppliers
        .iter()
        .any(|s| string_similarity(&invoice.supplier, s) > SUPPLIER_SIMILARITY_MIN)
}
