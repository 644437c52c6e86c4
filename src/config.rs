use serde::{Deserialize, Serialize};

use crate::error::ReconError;

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// 单次对账的最长运行时间 (秒)，超时后剩余发票记为未匹配
    pub run_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            run_timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> recon.toml (可选) -> RECON__* 环境变量
    pub fn load() -> Result<Self, ReconError> {
        let settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("recon").required(false))
            .add_source(
                config::Environment::with_prefix("RECON")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let app: AppConfig = settings.try_deserialize()?;
        app.reconciliation.validate()?;
        Ok(app)
    }
}

/// 匹配策略 - 决定执行哪些阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchingStrategy {
    /// 全部四个阶段
    #[default]
    Intelligent,
    /// 仅订单号精确匹配
    ExactOnly,
    /// 精确匹配后接订单号模糊匹配
    ExactThenPartial,
}

/// 对账参数，按值传入一次运行，运行期间不会被修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconciliationConfig {
    /// 金额容差 (发票金额的比例)
    pub tolerance: f64,
    /// 订单号相似度阈值
    pub fuzzy_threshold: f64,
    pub date_tolerance_days: i64,
    /// 阶段 2/3 的最低接受置信度
    pub min_confidence: f64,
    pub enable_reference_matching: bool,
    /// 阶段 4 的容差放大倍数
    pub extended_tolerance_factor: f64,
    pub strategy: MatchingStrategy,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.01,
            fuzzy_threshold: 0.8,
            date_tolerance_days: 30,
            min_confidence: 0.6,
            enable_reference_matching: true,
            extended_tolerance_factor: 5.0,
            strategy: MatchingStrategy::Intelligent,
        }
    }
}

impl ReconciliationConfig {
    /// "扩大容差" 开关: 开启为 5 倍，关闭为 2 倍
    pub fn with_extended_tolerance(mut self, enabled: bool) -> Self {
        self.extended_tolerance_factor = if enabled { 5.0 } else { 2.0 };
        self
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if !(0.0..=1.0).contains(&self.tolerance) {
            return Err(ReconError::InvalidConfig(format!(
                "tolerance must be within [0, 1], got {}",
                self.tolerance
            )));
        }
        if !(0.0..=1.0).contains(&self.fuzzy_threshold) {
            return Err(ReconError::InvalidConfig(format!(
                "fuzzy_threshold must be within [0, 1], got {}",
                self.fuzzy_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ReconError::InvalidConfig(format!(
                "min_confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if !(self.extended_tolerance_factor > 0.0) || !self.extended_tolerance_factor.is_finite() {
            return Err(ReconError::InvalidConfig(format!(
                "extended_tolerance_factor must be positive, got {}",
                self.extended_tolerance_factor
            )));
        }
        if self.date_tolerance_days < 0 {
            return Err(ReconError::InvalidConfig(format!(
                "date_tolerance_days must not be negative, got {}",
                self.date_tolerance_days
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ReconciliationConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.strategy, MatchingStrategy::Intelligent);
        assert_eq!(cfg.extended_tolerance_factor, 5.0);
    }

    #[test]
    fn extended_tolerance_switch() {
        let off = ReconciliationConfig::default().with_extended_tolerance(false);
        assert_eq!(off.extended_tolerance_factor, 2.0);
        let on = off.with_extended_tolerance(true);
        assert_eq!(on.extended_tolerance_factor, 5.0);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cfg = ReconciliationConfig {
            tolerance: 1.5,
            ..Default::default()
        };
        assert!(cfg.validate().unwrap_err().to_string().contains("tolerance"));

        let cfg = ReconciliationConfig {
            extended_tolerance_factor: 0.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());

        let cfg = ReconciliationConfig {
            min_confidence: f64::NAN,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg: ReconciliationConfig =
            serde_json::from_str(r#"{"tolerance": 0.02, "strategy": "exact_only"}"#).unwrap();
        assert_eq!(cfg.tolerance, 0.02);
        assert_eq!(cfg.strategy, MatchingStrategy::ExactOnly);
        assert_eq!(cfg.min_confidence, 0.6);
    }
}
