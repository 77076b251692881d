// ==========================================
// 激光切割车间 - 配置层
// ==========================================
// 职责: 余料业务策略参数管理
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod offcut_policy;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use offcut_policy::{OffcutPolicy, SafetyMargins};
