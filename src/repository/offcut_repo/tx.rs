use super::core::map_reservation_row;
use crate::domain::offcut::{Offcut, OffcutReservation, OffcutUsage, ReservationFilter};
use crate::domain::types::OffcutStatus;
use crate::repository::error::RepositoryResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Transaction, ToSql};

// ==========================================
// OffcutTx - 余料写事务句柄
// ==========================================
// 仅在 OffcutRepository::with_locked_offcut 内可用
// 所有写入与前置读取共处同一事务
pub struct OffcutTx<'a> {
    tx: &'a Transaction<'a>,
}

impl<'a> OffcutTx<'a> {
    pub(super) fn new(tx: &'a Transaction<'a>) -> Self {
        Self { tx }
    }

    /// 覆写余料可编辑字段 (状态与软删除标记除外)
    pub fn write_offcut(&self, offcut: &Offcut) -> RepositoryResult<()> {
        let parts = offcut.shape.to_parts();
        self.tx.execute(
            r#"
            UPDATE offcut
            SET thickness_mm = ?2, shape_type = ?3,
                width_mm = ?4, height_mm = ?5,
                bounding_box_width_mm = ?6, bounding_box_height_mm = ?7,
                estimated_area_mm2 = ?8, quantity = ?9, location_label = ?10,
                condition = ?11, source = ?12, notes = ?13, updated_at = ?14
            WHERE offcut_id = ?1
            "#,
            params![
                offcut.offcut_id,
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
                offcut.source,
                offcut.notes,
                offcut.updated_at,
            ],
        )?;
        Ok(())
    }

    /// 更新状态
    pub fn set_status(
        &self,
        offcut_id: &str,
        status: OffcutStatus,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.tx.execute(
            "UPDATE offcut SET status = ?2, updated_at = ?3 WHERE offcut_id = ?1",
            params![offcut_id, status.to_db_str(), now],
        )?;
        Ok(())
    }

    /// 同时更新状态与剩余面积
    pub fn set_status_and_area(
        &self,
        offcut_id: &str,
        status: OffcutStatus,
        estimated_area_mm2: Option<f64>,
        now: DateTime<Utc>,
    ) -> RepositoryResult<()> {
        self.tx.execute(
            r#"
            UPDATE offcut
            SET status = ?2, estimated_area_mm2 = ?3, updated_at = ?4
            WHERE offcut_id = ?1
            "#,
            params![offcut_id, status.to_db_str(), estimated_area_mm2, now],
        )?;
        Ok(())
    }

    /// 软删除: 写入 deleted_at 并置为 DISCARDED
    pub fn mark_deleted(&self, offcut_id: &str, now: DateTime<Utc>) -> RepositoryResult<()> {
        self.tx.execute(
            r#"
            UPDATE offcut
            SET deleted_at = ?2, status = ?3, updated_at = ?2
            WHERE offcut_id = ?1
            "#,
            params![offcut_id, now, OffcutStatus::Discarded.to_db_str()],
        )?;
        Ok(())
    }

    // ==========================================
    // 预留
    // ==========================================

    pub fn insert_reservation(&self, reservation: &OffcutReservation) -> RepositoryResult<()> {
        self.tx.execute(
            r#"
            INSERT INTO offcut_reservation (
                reservation_id, offcut_id, order_item_id, batch_id,
                reserved_by_user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                reservation.reservation_id,
                reservation.offcut_id,
                reservation.order_item_id,
                reservation.batch_id,
                reservation.reserved_by_user_id,
                reservation.created_at,
            ],
        )?;
        Ok(())
    }

    /// 删除该余料的全部预留
    pub fn delete_all_reservations(&self, offcut_id: &str) -> RepositoryResult<usize> {
        let rows = self.tx.execute(
            "DELETE FROM offcut_reservation WHERE offcut_id = ?1",
            params![offcut_id],
        )?;
        Ok(rows)
    }

    /// 按条件删除预留
    ///
    /// 条件中出现的字段逐一做等值匹配; 条件为空时删除该余料的全部预留
    pub fn delete_matching_reservations(
        &self,
        offcut_id: &str,
        filter: &ReservationFilter,
    ) -> RepositoryResult<usize> {
        let mut sql = String::from("DELETE FROM offcut_reservation WHERE offcut_id = ?");
        let mut args: Vec<&dyn ToSql> = vec![&offcut_id];
        if let Some(ref order_item_id) = filter.order_item_id {
            sql.push_str(" AND order_item_id = ?");
            args.push(order_item_id);
        }
        if let Some(ref batch_id) = filter.batch_id {
            sql.push_str(" AND batch_id = ?");
            args.push(batch_id);
        }

        let rows = self.tx.execute(&sql, args.as_slice())?;
        Ok(rows)
    }

    /// 事务内读取剩余预留
    pub fn reservations(&self, offcut_id: &str) -> RepositoryResult<Vec<OffcutReservation>> {
        let mut stmt = self.tx.prepare(
            r#"
            SELECT reservation_id, offcut_id, order_item_id, batch_id,
                   reserved_by_user_id, created_at
            FROM offcut_reservation
            WHERE offcut_id = ?1
            ORDER BY created_at
            "#,
        )?;
        let rows = stmt
            .query_map(params![offcut_id], map_reservation_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // 消耗记录 (只增)
    // ==========================================

    pub fn insert_usage(&self, usage: &OffcutUsage) -> RepositoryResult<()> {
        self.tx.execute(
            r#"
            INSERT INTO offcut_usage (
                usage_id, offcut_id, usage_type, used_area_mm2, used_width_mm,
                used_height_mm, order_item_id, batch_id, notes,
                created_by_user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
            params![
                usage.usage_id,
                usage.offcut_id,
                usage.usage_type.to_db_str(),
                usage.used_area_mm2,
                usage.used_width_mm,
                usage.used_height_mm,
                usage.order_item_id,
                usage.batch_id,
                usage.notes,
                usage.created_by_user_id,
                usage.created_at,
            ],
        )?;
        Ok(())
    }
}
