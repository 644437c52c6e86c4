use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticLevel {
    Info,
    Warn,
}

/// 诊断来源阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticStage {
    Input,
    InvoicePreparation,
    LineAggregation,
    Matching,
}

/// 单条记录级诊断
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub stage: DiagnosticStage,
    /// 关联的记录 (发票文件名、行号、订单号...)
    pub subject: String,
    pub message: String,
}

impl Diagnostic {
    pub fn warn(stage: DiagnosticStage, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Warn,
            stage,
            subject: subject.into(),
            message: message.into(),
        }
    }

    pub fn info(stage: DiagnosticStage, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Info,
            stage,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

/// 诊断输出 - 由调用方注入流水线
pub trait DiagnosticsSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// 默认实现: 转发到 tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn emit(&self, d: Diagnostic) {
        match d.level {
            DiagnosticLevel::Info => {
                tracing::info!(stage = ?d.stage, subject = %d.subject, "{}", d.message)
            }
            DiagnosticLevel::Warn => {
                tracing::warn!(stage = ?d.stage, subject = %d.subject, "{}", d.message)
            }
        }
    }
}

/// 收集到内存 (测试、API 响应)
#[derive(Debug, Default)]
pub struct CollectingSink {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn into_entries(self) -> Vec<Diagnostic> {
        self.entries.into_inner().unwrap_or_default()
    }

    pub fn count_at(&self, stage: DiagnosticStage) -> usize {
        self.snapshot().iter().filter(|d| d.stage == stage).count()
    }
}

impl DiagnosticsSink for CollectingSink {
    fn emit(&self, diagnostic: Diagnostic) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(diagnostic);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collecting_sink_keeps_order() {
        let sink = CollectingSink::new();
        sink.emit(Diagnostic::warn(DiagnosticStage::InvoicePreparation, "a.pdf", "excluded"));
        sink.emit(Diagnostic::info(DiagnosticStage::Matching, "b.pdf", "no candidate"));

        assert_eq!(sink.count_at(DiagnosticStage::InvoicePreparation), 1);
        let entries = sink.into_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].subject, "a.pdf");
        assert_eq!(entries[1].level, DiagnosticLevel::Info);
    }
}
