use super::tx::OffcutTx;
use crate::db::open_sqlite_connection;
use crate::domain::offcut::{Offcut, OffcutReservation, OffcutShape, OffcutUsage, ShapeParts};
use crate::domain::types::{OffcutCondition, OffcutStatus, ShapeType, UsageType};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// offcut 表查询列 (表别名固定为 o)
pub(super) const OFFCUT_COLUMNS: &str = r#"
    o.offcut_id, o.material_id, o.thickness_mm, o.shape_type,
    o.width_mm, o.height_mm, o.bounding_box_width_mm, o.bounding_box_height_mm,
    o.estimated_area_mm2, o.quantity, o.location_label, o.condition, o.status,
    o.source, o.notes, o.created_by_user_id, o.deleted_at, o.created_at, o.updated_at
"#;

// ==========================================
// OffcutRepository - 余料仓储
// ==========================================
pub struct OffcutRepository {
    conn: Arc<Mutex<Connection>>,
}

impl OffcutRepository {
    /// 打开独立连接创建仓储实例
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    pub(super) fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // 写入操作
    // ==========================================

    /// 插入余料
    pub fn insert(&self, offcut: &Offcut) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let parts = offcut.shape.to_parts();

        conn.execute(
            r#"
            INSERT INTO offcut (
                offcut_id, material_id, thickness_mm, shape_type,
                width_mm, height_mm, bounding_box_width_mm, bounding_box_height_mm,
                estimated_area_mm2, quantity, location_label, condition, status,
                source, notes, created_by_user_id, deleted_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
            "#,
            params![
                offcut.offcut_id,
                offcut.material_id,
                offcut.thickness_mm,
                offcut.shape.shape_type().to_db_str(),
                parts.width_mm,
                parts.height_mm,
                parts.bounding_box_width_mm,
                parts.bounding_box_height_mm,
                offcut.estimated_area_mm2,
                offcut.quantity,
                offcut.location_label,
                offcut.condition.to_db_str(),
                offcut.status.to_db_str(),
                offcut.source,
                offcut.notes,
                offcut.created_by_user_id,
                offcut.deleted_at,
                offcut.created_at,
                offcut.updated_at,
            ],
        )?;

        Ok(offcut.offcut_id.clone())
    }

    /// 在写事务内锁定并重新读取余料, 再执行写入闭包
    ///
    /// # 说明
    /// - BEGIN IMMEDIATE: 事务开始即持有写锁, 并发调用按顺序串行
    /// - 软删除或不存在的余料返回 NotFound, 闭包不会被调用
    /// - 闭包返回 Err 时事务回滚
    pub fn with_locked_offcut<T, E, F>(&self, offcut_id: &str, f: F) -> Result<T, E>
    where
        E: From<RepositoryError>,
        F: FnOnce(&OffcutTx<'_>, Offcut) -> Result<T, E>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let offcut = find_active(&tx, offcut_id)?
            .ok_or_else(|| RepositoryError::offcut_not_found(offcut_id))?;

        let out = f(&OffcutTx::new(&tx), offcut)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(out)
    }
}

// ==========================================
// 行映射
// ==========================================

/// 查询未软删除的余料
pub(super) fn find_active(conn: &Connection, offcut_id: &str) -> RepositoryResult<Option<Offcut>> {
    let sql = format!(
        "SELECT {} FROM offcut o WHERE o.offcut_id = ?1 AND o.deleted_at IS NULL",
        OFFCUT_COLUMNS
    );
    let offcut = conn
        .query_row(&sql, params![offcut_id], map_offcut_row)
        .optional()?;
    Ok(offcut)
}

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

pub(super) fn map_offcut_row(row: &Row) -> rusqlite::Result<Offcut> {
    let shape_raw: String = row.get(3)?;
    let shape_type = ShapeType::from_db_str(&shape_raw)
        .ok_or_else(|| conversion_error(3, format!("未知形状类型: {}", shape_raw)))?;
    let parts = ShapeParts {
        width_mm: row.get(4)?,
        height_mm: row.get(5)?,
        bounding_box_width_mm: row.get(6)?,
        bounding_box_height_mm: row.get(7)?,
    };
    let estimated_area_mm2: Option<f64> = row.get(8)?;
    let shape = OffcutShape::from_parts(shape_type, &parts, estimated_area_mm2)
        .map_err(|msg| conversion_error(3, msg))?;

    let condition_raw: String = row.get(11)?;
    let condition = OffcutCondition::from_db_str(&condition_raw)
        .ok_or_else(|| conversion_error(11, format!("未知成色: {}", condition_raw)))?;
    let status_raw: String = row.get(12)?;
    let status = OffcutStatus::from_db_str(&status_raw)
        .ok_or_else(|| conversion_error(12, format!("未知状态: {}", status_raw)))?;

    Ok(Offcut {
        offcut_id: row.get(0)?,
        material_id: row.get(1)?,
        thickness_mm: row.get(2)?,
        shape,
        estimated_area_mm2,
        quantity: row.get(9)?,
        location_label: row.get(10)?,
        condition,
        status,
        source: row.get(13)?,
        notes: row.get(14)?,
        created_by_user_id: row.get(15)?,
        deleted_at: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
    })
}

pub(super) fn map_reservation_row(row: &Row) -> rusqlite::Result<OffcutReservation> {
    Ok(OffcutReservation {
        reservation_id: row.get(0)?,
        offcut_id: row.get(1)?,
        order_item_id: row.get(2)?,
        batch_id: row.get(3)?,
        reserved_by_user_id: row.get(4)?,
        created_at: row.get(5)?,
    })
}

pub(super) fn map_usage_row(row: &Row) -> rusqlite::Result<OffcutUsage> {
    let usage_raw: String = row.get(2)?;
    let usage_type = UsageType::from_db_str(&usage_raw)
        .ok_or_else(|| conversion_error(2, format!("未知消耗类型: {}", usage_raw)))?;

    Ok(OffcutUsage {
        usage_id: row.get(0)?,
        offcut_id: row.get(1)?,
        usage_type,
        used_area_mm2: row.get(3)?,
        used_width_mm: row.get(4)?,
        used_height_mm: row.get(5)?,
        order_item_id: row.get(6)?,
        batch_id: row.get(7)?,
        notes: row.get(8)?,
        created_by_user_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}
