// ==========================================
// 激光切割车间 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、构造期校验
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod catalog;
pub mod offcut;
pub mod types;

// 重导出核心类型
pub use catalog::{Material, MaterialHint, OrderItem, ProductTemplate};
pub use offcut::{
    CreateOffcutInput, Offcut, OffcutListFilter, OffcutReservation, OffcutShape, OffcutUsage,
    ReservationFilter, ReserveOffcutInput, ShapeParts, UpdateOffcutInput, UseFullInput,
    UsePartialInput,
};
pub use types::{MaterialCategory, OffcutCondition, OffcutStatus, ShapeType, UsageType};
