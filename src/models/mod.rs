pub mod invoice;
pub mod order;
pub mod pool;
pub mod raw;
pub mod report;
pub mod result;

pub use invoice::{InvoiceRecord, InvoiceReference};
pub use order::{LineContribution, OrderAggregate};
pub use pool::OrderPool;
pub use raw::{RawField, RawInvoiceRecord, RawInvoiceReference, RawLineRecord};
pub use report::{
    DiscrepancyAnalysis, Grade, MethodStats, QualityAssessment, ReconciliationResult,
    ReconciliationSummary, RunMetadata, Totals,
};
pub use result::{
    DiscrepancyPriority, ExcludedInvoice, InvoiceState, MatchDifferences, MatchEvidence,
    MatchMetadata, MatchMethod, MatchResult, MatchType, ReferenceHit, UnmatchedInvoice,
    UnmatchedOrder,
};
