use indexmap::IndexMap;
use rayon::iter::IndexedParallelIterator;

use crate::models::OrderAggregate;

/// 可用订单池 - 订单号 -> 汇总
///
/// 一个汇总被接受时立即从池中移出，所有权随之转移到匹配结果，
/// 因此同一汇总在一次运行中至多被一张发票认领。
#[derive(Debug, Clone, Default)]
pub struct OrderPool {
    orders: IndexMap<String, OrderAggregate>,
}

impl OrderPool {
    pub fn from_aggregates(aggregates: impl IntoIterator<Item = OrderAggregate>) -> Self {
        Self {
            orders: aggregates
                .into_iter()
                .map(|agg| (agg.order_number.clone(), agg))
                .collect(),
        }
    }

    pub fn get(&self, order_number: &str) -> Option<&OrderAggregate> {
        self.orders.get(order_number)
    }

    /// 认领: 移出并交出所有权 (保持剩余顺序)
    pub fn claim(&mut self, order_number: &str) -> Option<OrderAggregate> {
        self.orders.shift_remove(order_number)
    }

    /// 只读并行遍历，用于候选评分
    pub fn par_values(&self) -> impl IndexedParallelIterator<Item = &OrderAggregate> + '_ {
        self.orders.par_values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn total_amount(&self) -> f64 {
        self.orders.values().map(|o| o.total_amount).sum()
    }

    pub fn into_remaining(self) -> Vec<OrderAggregate> {
        self.orders.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agg(order: &str) -> OrderAggregate {
        let mut a = OrderAggregate::new(order.to_string());
        a.finalize();
        a
    }

    #[test]
    fn claim_removes_entry_once() {
        let mut pool = OrderPool::from_aggregates(vec![agg("5600000001"), agg("5600000002")]);
        assert_eq!(pool.len(), 2);

        let claimed = pool.claim("5600000001").unwrap();
        assert_eq!(claimed.order_number, "5600000001");
        assert!(pool.claim("5600000001").is_none());
        assert!(pool.get("5600000001").is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn remaining_keeps_insertion_order() {
        let mut pool =
            OrderPool::from_aggregates(vec![agg("5600000003"), agg("5600000001"), agg("5600000002")]);
        pool.claim("5600000001");
        let rest: Vec<_> = pool.into_remaining().into_iter().map(|a| a.order_number).collect();
        assert_eq!(rest, vec!["5600000003", "5600000002"]);
    }
}
