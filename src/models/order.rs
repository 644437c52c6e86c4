use bigdecimal::{BigDecimal, Zero};
use chrono::NaiveDate;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// 按订单号汇总的表格明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAggregate {
    pub order_number: String,
    /// 明细金额精确累加值
    pub exact_total: BigDecimal,
    pub total_amount: f64,
    pub line_count: usize,
    pub collaborators: IndexSet<String>,
    pub cost_centers: IndexSet<String>,
    /// 每行的成本中心 (可重复)，引用交叉匹配逐行比对
    pub line_cost_centers: Vec<String>,
    pub suppliers: IndexSet<String>,
    pub projects: IndexSet<String>,
    pub source_files: IndexSet<String>,
    pub billing_period_start: Option<NaiveDate>,
    pub billing_period_end: Option<NaiveDate>,
    pub total_lines: usize,
    pub valid_lines: usize,
    pub validity_rate: f64,
    pub amount_per_collaborator: f64,
    pub quality_score: f64,
}

/// 单行明细贡献 (已标准化)
#[derive(Debug, Clone, Default)]
pub struct LineContribution {
    pub amount: BigDecimal,
    pub cost_center: Option<String>,
    pub collaborator: Option<String>,
    pub supplier: Option<String>,
    pub source_filename: Option<String>,
    pub statement_date: Option<NaiveDate>,
    pub project: Option<String>,
}

fn insert_text(set: &mut IndexSet<String>, value: Option<String>) {
    if let Some(v) = value {
        let v = v.trim();
        if !v.is_empty() {
            set.insert(v.to_string());
        }
    }
}

impl OrderAggregate {
    pub fn new(order_number: String) -> Self {
        Self {
            order_number,
            exact_total: BigDecimal::zero(),
            total_amount: 0.0,
            line_count: 0,
            collaborators: IndexSet::new(),
            cost_centers: IndexSet::new(),
            line_cost_centers: Vec::new(),
            suppliers: IndexSet::new(),
            projects: IndexSet::new(),
            source_files: IndexSet::new(),
            billing_period_start: None,
            billing_period_end: None,
            total_lines: 0,
            valid_lines: 0,
            validity_rate: 0.0,
            amount_per_collaborator: 0.0,
            quality_score: 0.0,
        }
    }

    /// 累加一条有效明细
    pub fn add_line(&mut self, line: LineContribution) {
        self.exact_total += line.amount;
        self.line_count += 1;
        self.total_lines += 1;
        self.valid_lines += 1;

        if let Some(cc) = line.cost_center.as_deref().map(str::trim) {
            if !cc.is_empty() {
                self.line_cost_centers.push(cc.to_string());
            }
        }
        insert_text(&mut self.cost_centers, line.cost_center);
        insert_text(&mut self.collaborators, line.collaborator);
        insert_text(&mut self.suppliers, line.supplier);
        insert_text(&mut self.source_files, line.source_filename);
        insert_text(&mut self.projects, line.project);

        if let Some(date) = line.statement_date {
            self.billing_period_start = Some(self.billing_period_start.map_or(date, |d| d.min(date)));
            self.billing_period_end = Some(self.billing_period_end.map_or(date, |d| d.max(date)));
        }
    }

    /// 无效明细只计入行数 (拉低有效率)，不贡献金额和属性
    pub fn add_invalid_line(&mut self) {
        self.total_lines += 1;
    }

    /// 汇总完成后计算派生指标
    pub fn finalize(&mut self) {
        // 经十进制文本转换，保证结果是最接近的 f64
        self.total_amount = self.exact_total.to_string().parse().unwrap_or(0.0);
        self.validity_rate = if self.total_lines > 0 {
            self.valid_lines as f64 / self.total_lines as f64
        } else {
            0.0
        };
        self.amount_per_collaborator = if self.collaborators.is_empty() {
            0.0
        } else {
            self.total_amount / self.collaborators.len() as f64
        };

        let mut score = 0.4; // 订单号一定存在
        if self.total_amount > 0.0 {
            score += 0.3;
        }
        if !self.collaborators.is_empty() {
            score += 0.15;
        }
        if !self.cost_centers.is_empty() {
            score += 0.15;
        }
        self.quality_score = f64::min(1.0, score * self.validity_rate);
    }

    /// 最早/最晚账单日期
    pub fn line_dates(&self) -> impl Iterator<Item = NaiveDate> {
        self.billing_period_start.into_iter().chain(self.billing_period_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn line(amount: &str, cc: &str, date: Option<&str>) -> LineContribution {
        LineContribution {
            amount: BigDecimal::from_str(amount).unwrap(),
            cost_center: Some(cc.to_string()),
            collaborator: Some("Alice".to_string()),
            statement_date: date.map(|d| NaiveDate::from_str(d).unwrap()),
            ..Default::default()
        }
    }

    #[test]
    fn sums_lines_exactly() {
        let mut agg = OrderAggregate::new("5600025054".into());
        agg.add_line(line("0.1", "A", None));
        agg.add_line(line("0.2", "A", None));
        agg.finalize();
        assert_eq!(agg.exact_total, BigDecimal::from_str("0.3").unwrap());
        assert_eq!(agg.total_amount, 0.3);
        assert_eq!(agg.line_count, 2);
        assert_eq!(agg.cost_centers.len(), 1);
        assert_eq!(agg.line_cost_centers.len(), 2);
        assert_eq!(agg.amount_per_collaborator, 0.3);
    }

    #[test]
    fn negative_lines_reduce_total() {
        let mut agg = OrderAggregate::new("5600025054".into());
        agg.add_line(line("100.00", "A", None));
        agg.add_line(line("-20.50", "A", None));
        agg.finalize();
        assert_eq!(agg.total_amount, 79.5);
    }

    #[test]
    fn invalid_lines_lower_validity() {
        let mut agg = OrderAggregate::new("5600025054".into());
        agg.add_line(line("10", "A", None));
        agg.add_invalid_line();
        agg.finalize();
        assert_eq!(agg.line_count, 1);
        assert_eq!(agg.validity_rate, 0.5);
        assert!((agg.quality_score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn billing_period_spans_statement_dates() {
        let mut agg = OrderAggregate::new("5600025054".into());
        agg.add_line(line("1", "A", Some("2024-03-15")));
        agg.add_line(line("1", "A", Some("2024-01-02")));
        agg.add_line(line("1", "A", Some("2024-02-10")));
        agg.finalize();
        assert_eq!(agg.billing_period_start, NaiveDate::from_ymd_opt(2024, 1, 2));
        assert_eq!(agg.billing_period_end, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(agg.line_dates().count(), 2);
    }
}
