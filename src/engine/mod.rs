// ==========================================
// 激光切割车间 - 引擎层
// ==========================================
// 职责: 余料业务规则 (需求推导 / 适配评分 / 生命周期判定 / 推荐)
// 红线: 规则引擎不拼 SQL, 每条推荐必须带 fit_reason
// ==========================================

pub mod fit_scorer;
pub mod offcut_lifecycle;
pub mod requirement_resolver;
pub mod suggestion;

// 重导出核心引擎
pub use fit_scorer::{FitCandidate, FitReason, FitRequirement, FitScore, FitScorer};
pub use offcut_lifecycle::{
    derive_partial_usage, ensure_transition_allowed, LifecycleOperation, PartialUsageOutcome,
    TransitionRejected,
};
pub use requirement_resolver::{BatchRequirement, Requirement, RequirementResolver};
pub use suggestion::{BatchGroupSuggestion, OffcutSuggestion, SuggestionEngine};
