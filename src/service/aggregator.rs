use std::collections::HashMap;

use indexmap::IndexMap;

use crate::error::ReconError;
use crate::models::{LineContribution, OrderAggregate, OrderPool, RawLineRecord};
use crate::service::diagnostics::{Diagnostic, DiagnosticStage, DiagnosticsSink};
use crate::service::normalizer::{
    normalize_amount_decimal, normalize_order_field, normalize_supplier, parse_date,
};

/// 汇总结果: 订单池 + 被丢弃行的统计
#[derive(Debug, Default)]
pub struct AggregationOutcome {
    pub pool: OrderPool,
    /// 有效但订单号无法解析的行
    pub orphan_lines: usize,
    pub invalid_lines: usize,
    /// 缺少金额等结构性问题被跳过的行
    pub malformed_lines: usize,
}

fn contribution(position: usize, line: RawLineRecord) -> Result<LineContribution, ReconError> {
    let Some(amount) = line.net_amount.as_ref() else {
        return Err(ReconError::MalformedLine {
            position,
            reason: "net amount missing".to_string(),
        });
    };
    Ok(LineContribution {
        amount: normalize_amount_decimal(amount),
        cost_center: line.cost_center,
        collaborator: line.collaborator,
        supplier: line.supplier.as_deref().map(normalize_supplier),
        source_filename: line.source_filename,
        statement_date: line.statement_date.as_deref().and_then(parse_date),
        project: line.project,
    })
}

/// 按标准化订单号汇总明细行
pub fn aggregate_lines(lines: Vec<RawLineRecord>, sink: &dyn DiagnosticsSink) -> AggregationOutcome {
    let total = lines.len();
    let mut aggregates: IndexMap<String, OrderAggregate> = IndexMap::new();
    let mut invalid_by_order: HashMap<String, usize> = HashMap::new();
    let mut outcome = AggregationOutcome::default();

    for (position, line) in lines.into_iter().enumerate() {
        let order_number = line.order_number.as_ref().and_then(normalize_order_field);

        if !line.is_valid {
            outcome.invalid_lines += 1;
            if let Some(order) = order_number {
                *invalid_by_order.entry(order).or_insert(0) += 1;
            }
            continue;
        }

        let Some(order_number) = order_number else {
            outcome.orphan_lines += 1;
            let raw = line.order_number.as_ref().map(|o| o.as_text()).unwrap_or_default();
            sink.emit(Diagnostic::info(
                DiagnosticStage::LineAggregation,
                format!("line {}", position),
                format!("order number '{}' not resolvable, line dropped", raw),
            ));
            continue;
        };

        match contribution(position, line) {
            Ok(contrib) => aggregates
                .entry(order_number.clone())
                .or_insert_with(|| OrderAggregate::new(order_number))
                .add_line(contrib),
            Err(err) => {
                outcome.malformed_lines += 1;
                sink.emit(Diagnostic::warn(
                    DiagnosticStage::LineAggregation,
                    format!("line {}", position),
                    err.to_string(),
                ));
            }
        }
    }

    for (order, invalid) in invalid_by_order {
        if let Some(agg) = aggregates.get_mut(&order) {
            for _ in 0..invalid {
                agg.add_invalid_line();
            }
        }
    }
    for agg in aggregates.values_mut() {
        agg.finalize();
    }

    tracing::info!(
        "明细汇总完成: {} 行 -> {} 个订单 (孤立 {}, 无效 {}, 异常 {})",
        total,
        aggregates.len(),
        outcome.orphan_lines,
        outcome.invalid_lines,
        outcome.malformed_lines
    );

    outcome.pool = OrderPool::from_aggregates(aggregates.into_values());
    outcome
}
