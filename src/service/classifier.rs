use crate::models::{DiscrepancyPriority, MatchMethod, MatchType};

/// 各阶段分类所用的容差比例: 引用交叉匹配放宽一倍
pub fn classification_tolerance(method: MatchMethod, base_tolerance: f64) -> f64 {
    match method {
        MatchMethod::ReferenceCross => base_tolerance * 2.0,
        MatchMethod::ExactOrder | MatchMethod::PartialOrder | MatchMethod::AmountFuzzy => {
            base_tolerance
        }
    }
}

/// 差额在 `发票金额 × 容差` 以内为完全匹配，否则为差异
pub fn classify(amount_diff: f64, invoice_amount: f64, tolerance: f64) -> MatchType {
    if amount_diff <= invoice_amount * tolerance {
        MatchType::PerfectMatch
    } else {
        MatchType::Discrepancy
    }
}

/// 差额占发票金额的百分比
pub fn difference_percent(amount_diff: f64, invoice_amount: f64) -> f64 {
    if invoice_amount > 0.0 {
        amount_diff * 100.0 / invoice_amount
    } else {
        0.0
    }
}

/// 差异优先级: 绝对金额或百分比任一超过阈值即升级
pub fn discrepancy_priority(amount_diff: f64, percent: f64) -> DiscrepancyPriority {
    if amount_diff > 1000.0 || percent > 15.0 {
        DiscrepancyPriority::Critical
    } else if amount_diff > 500.0 || percent > 10.0 {
        DiscrepancyPriority::High
    } else if amount_diff > 100.0 || percent > 5.0 {
        DiscrepancyPriority::Medium
    } else {
        DiscrepancyPriority::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tolerance_band_per_method() {
        assert_eq!(classification_tolerance(MatchMethod::ExactOrder, 0.01), 0.01);
        assert_eq!(classification_tolerance(MatchMethod::ReferenceCross, 0.01), 0.02);
        assert_eq!(classification_tolerance(MatchMethod::PartialOrder, 0.01), 0.01);
        assert_eq!(classification_tolerance(MatchMethod::AmountFuzzy, 0.01), 0.01);
    }

    #[test]
    fn classify_at_boundary() {
        assert_eq!(classify(1.0, 100.0, 0.01), MatchType::PerfectMatch);
        assert_eq!(classify(1.5, 100.0, 0.01), MatchType::Discrepancy);
        assert_eq!(classify(1.5, 100.0, 0.02), MatchType::PerfectMatch);
    }

    #[test]
    fn priority_bands() {
        assert_eq!(discrepancy_priority(1500.0, 1.0), DiscrepancyPriority::Critical);
        assert_eq!(discrepancy_priority(10.0, 20.0), DiscrepancyPriority::Critical);
        assert_eq!(discrepancy_priority(10.0, 10.0), DiscrepancyPriority::Medium);
        assert_eq!(discrepancy_priority(600.0, 1.0), DiscrepancyPriority::High);
        assert_eq!(discrepancy_priority(150.0, 1.0), DiscrepancyPriority::Medium);
        assert_eq!(discrepancy_priority(5.0, 2.0), DiscrepancyPriority::Low);
    }

    #[test]
    fn percent_of_invoice_amount() {
        assert_eq!(difference_percent(10.0, 100.0), 10.0);
        assert_eq!(difference_percent(10.0, 0.0), 0.0);
    }
}
