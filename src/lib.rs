// ==========================================
// 激光切割车间 - 余料管理核心库
// ==========================================
// 范围: 余料生命周期 (建档/预留/使用/报废) 与余料适配推荐
// 技术栈: Rust + SQLite (rusqlite)
// 系统定位: 决策支持 (推荐只是快照, 最终以预留/使用时的事务校验为准)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 配置层 - 策略参数
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一/建表）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{MaterialCategory, OffcutCondition, OffcutStatus, ShapeType, UsageType};

// 领域实体
pub use domain::{
    CreateOffcutInput, Material, Offcut, OffcutReservation, OffcutShape, OffcutUsage, OrderItem,
    UpdateOffcutInput,
};

// 引擎
pub use engine::{FitReason, FitScorer, RequirementResolver, SuggestionEngine};

// API
pub use api::{ApiError, ApiResult, OffcutApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "激光切割余料管理";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
