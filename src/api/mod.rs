// ==========================================
// 激光切割车间 - API 层
// ==========================================
// 职责: 对外提供余料生命周期与推荐接口
// 鉴权/权限检查由调用方 (HTTP 层) 完成
// ==========================================

pub mod error;
pub mod offcut_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use offcut_api::{OffcutApi, UsageOutcome};
