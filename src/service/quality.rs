use crate::models::{Grade, QualityAssessment};

/// 质量评估的输入统计
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QualityInputs {
    pub matches: usize,
    pub discrepancies: usize,
    pub unmatched_invoices: usize,
    pub unmatched_orders: usize,
    /// 合格发票数 N
    pub eligible_invoices: usize,
    /// 所有接受配对的平均置信度
    pub average_confidence: Option<f64>,
    pub average_discrepancy: Option<f64>,
    /// 合格发票金额合计
    pub total_amount: f64,
}

impl QualityInputs {
    pub fn matching_rate(&self) -> f64 {
        percentage(self.matches, self.eligible_invoices)
    }

    pub fn coverage_rate(&self) -> f64 {
        percentage(self.matches + self.discrepancies, self.eligible_invoices)
    }

    pub fn discrepancy_rate(&self) -> f64 {
        percentage(self.discrepancies, self.eligible_invoices)
    }
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// 运行级质量评分 (0-100)、等级与建议
pub struct QualityAssessor;

impl QualityAssessor {
    /// 未取整的质量分
    pub fn score(inputs: &QualityInputs) -> f64 {
        let matching = f64::min(40.0, inputs.matching_rate() * 0.4);
        let coverage = f64::min(30.0, inputs.coverage_rate() * 0.3);
        let confidence = inputs.average_confidence.unwrap_or(0.0) * 10.0;
        matching + coverage + Self::discrepancy_band(inputs) + confidence
    }

    /// 差异严重度分段: 平均差异 / 总金额
    fn discrepancy_band(inputs: &QualityInputs) -> f64 {
        let average = match inputs.average_discrepancy {
            Some(avg) if inputs.discrepancies > 0 => avg,
            _ => return 20.0,
        };
        let ratio = if inputs.total_amount > 0.0 {
            average / inputs.total_amount * 100.0
        } else {
            0.0
        };
        if ratio <= 1.0 {
            20.0
        } else if ratio <= 5.0 {
            15.0
        } else if ratio <= 10.0 {
            10.0
        } else {
            0.0
        }
    }

    pub fn recommendations(inputs: &QualityInputs) -> Vec<String> {
        let matching_rate = inputs.matching_rate();
        let coverage_rate = inputs.coverage_rate();
        let mut recs = Vec::new();

        if matching_rate < 80.0 {
            recs.push(
                "Low matching rate: check that order numbers are consistent between invoices and spreadsheets"
                    .to_string(),
            );
        }
        if coverage_rate < 90.0 {
            recs.push("Insufficient coverage: check the completeness of the source data".to_string());
        }
        if inputs.unmatched_invoices > 0 {
            recs.push(format!(
                "{} invoice(s) not reconciled: review the document extraction output",
                inputs.unmatched_invoices
            ));
        }
        if inputs.unmatched_orders > 0 {
            recs.push(format!(
                "{} order(s) not reconciled: check that both sources cover the same period",
                inputs.unmatched_orders
            ));
        }
        if let Some(avg) = inputs.average_discrepancy.filter(|avg| *avg > 50.0) {
            recs.push(format!(
                "Significant discrepancies detected (average {:.2}): check the rates and calculations applied",
                avg
            ));
        }
        if matching_rate >= 95.0 && coverage_rate >= 95.0 {
            recs.push("Excellent reconciliation rate: the process is working optimally".to_string());
        }
        if recs.is_empty() {
            recs.push("Reconciliation is functional: no priority action required".to_string());
        }
        recs
    }

    pub fn assess(inputs: &QualityInputs) -> QualityAssessment {
        let raw = Self::score(inputs);
        let grade = Grade::from_score(raw);
        QualityAssessment {
            score: (raw * 10.0).round() / 10.0,
            grade,
            assessment: grade.assessment().to_string(),
            recommendations: Self::recommendations(inputs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(matches: usize, discrepancies: usize, eligible: usize) -> QualityInputs {
        QualityInputs {
            matches,
            discrepancies,
            unmatched_invoices: eligible - matches - discrepancies,
            unmatched_orders: 0,
            eligible_invoices: eligible,
            average_confidence: Some(1.0),
            average_discrepancy: if discrepancies > 0 { Some(10.0) } else { None },
            total_amount: 10_000.0,
        }
    }

    #[test]
    fn perfect_run_scores_full_marks() {
        let assessment = QualityAssessor::assess(&inputs(10, 0, 10));
        assert_eq!(assessment.score, 100.0);
        assert_eq!(assessment.grade, Grade::A);
        assert_eq!(assessment.assessment, "Excellent");
        assert_eq!(assessment.recommendations.len(), 1);
        assert!(assessment.recommendations[0].starts_with("Excellent"));
    }

    #[test]
    fn grade_uses_unrounded_score() {
        let mut i = inputs(9, 0, 10);
        i.average_confidence = Some(0.6999);
        // 36 + 27 + 20 + 6.999
        assert!(QualityAssessor::score(&i) < 90.0);
        let assessment = QualityAssessor::assess(&i);
        assert_eq!(assessment.score, 90.0);
        assert_eq!(assessment.grade, Grade::B);
        assert_eq!(assessment.assessment, "Very good");
    }

    #[test]
    fn score_is_monotonic_in_matching_rate() {
        let mut previous = f64::MIN;
        for matches in 0..=20 {
            let current = QualityAssessor::score(&inputs(matches, 0, 20));
            assert!(current >= previous, "{} < {} at {}", current, previous, matches);
            previous = current;
        }
    }

    #[test]
    fn discrepancy_band_follows_ratio() {
        let mut i = inputs(5, 5, 10);
        assert_eq!(QualityAssessor::discrepancy_band(&i), 20.0);
        i.average_discrepancy = Some(300.0);
        assert_eq!(QualityAssessor::discrepancy_band(&i), 15.0);
        i.average_discrepancy = Some(800.0);
        assert_eq!(QualityAssessor::discrepancy_band(&i), 10.0);
        i.average_discrepancy = Some(2000.0);
        assert_eq!(QualityAssessor::discrepancy_band(&i), 0.0);
    }

    #[test]
    fn recommendations_cover_each_rule() {
        let mut i = inputs(2, 3, 10);
        i.unmatched_orders = 4;
        i.average_discrepancy = Some(75.0);
        let recs = QualityAssessor::recommendations(&i);
        assert_eq!(recs.len(), 5);
        assert!(recs[2].starts_with("5 invoice(s)"));
        assert!(recs[3].starts_with("4 order(s)"));
        assert!(recs[4].contains("75.00"));
    }

    #[test]
    fn neutral_recommendation_when_nothing_fires() {
        let mut i = inputs(9, 1, 10);
        i.average_discrepancy = Some(5.0);
        let recs = QualityAssessor::recommendations(&i);
        assert_eq!(recs, vec!["Reconciliation is functional: no priority action required".to_string()]);
    }

    #[test]
    fn empty_run_has_zero_rates() {
        let i = QualityInputs::default();
        assert_eq!(i.matching_rate(), 0.0);
        assert_eq!(i.coverage_rate(), 0.0);
        assert_eq!(QualityAssessor::score(&i), 20.0);
    }
}
