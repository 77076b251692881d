// ==========================================
// 激光切割车间 - 余料数据仓储
// ==========================================
// 表: offcut / offcut_reservation / offcut_usage
// 红线: Repository 不含业务逻辑; 状态变更只经事务句柄 OffcutTx
// ==========================================

mod core;
mod queries;
mod tx;

#[cfg(test)]
mod tests;

pub use self::core::OffcutRepository;
pub use tx::OffcutTx;
