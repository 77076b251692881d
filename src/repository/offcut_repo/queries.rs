use super::core::{
    find_active, map_offcut_row, map_reservation_row, map_usage_row, OffcutRepository,
    OFFCUT_COLUMNS,
};
use crate::domain::offcut::{Offcut, OffcutListFilter, OffcutReservation, OffcutUsage};
use crate::domain::types::{OffcutCondition, OffcutStatus};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Result as SqliteResult, ToSql};

impl OffcutRepository {
    // ==========================================
    // 查询操作 (软删除记录一律排除)
    // ==========================================

    /// 按 offcut_id 查询
    pub fn find_by_id(&self, offcut_id: &str) -> RepositoryResult<Option<Offcut>> {
        let conn = self.get_conn()?;
        find_active(&conn, offcut_id)
    }

    /// 条件查询余料列表 (按创建时间倒序)
    pub fn list(&self, filter: &OffcutListFilter) -> RepositoryResult<Vec<Offcut>> {
        let conn = self.get_conn()?;

        let status = filter.status.map(|s| s.to_db_str());
        let condition = filter.condition.map(|c| c.to_db_str());

        let mut sql = format!(
            "SELECT {} FROM offcut o WHERE o.deleted_at IS NULL",
            OFFCUT_COLUMNS
        );
        let mut args: Vec<&dyn ToSql> = Vec::new();
        if let Some(ref material_id) = filter.material_id {
            sql.push_str(" AND o.material_id = ?");
            args.push(material_id);
        }
        if let Some(ref thickness_mm) = filter.thickness_mm {
            sql.push_str(" AND o.thickness_mm = ?");
            args.push(thickness_mm);
        }
        if let Some(ref status) = status {
            sql.push_str(" AND o.status = ?");
            args.push(status);
        }
        if let Some(ref condition) = condition {
            sql.push_str(" AND o.condition = ?");
            args.push(condition);
        }
        if let Some(ref location_label) = filter.location_label {
            sql.push_str(" AND o.location_label = ?");
            args.push(location_label);
        }
        sql.push_str(" ORDER BY o.created_at DESC, o.offcut_id");

        let mut stmt = conn.prepare(&sql)?;
        let offcuts = stmt
            .query_map(args.as_slice(), map_offcut_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(offcuts)
    }

    /// 单件推荐候选: 同材料大类、同厚度、可用且未损坏
    ///
    /// category 为规范形式 (大写); 库中大类文本按 TRIM + UPPER 比较,
    /// 与 MaterialCategory::from_db_str 的解析一致
    pub fn list_candidates_by_category(
        &self,
        category: &str,
        thickness_mm: f64,
    ) -> RepositoryResult<Vec<Offcut>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM offcut o
            JOIN material m ON m.material_id = o.material_id
            WHERE o.deleted_at IS NULL
              AND o.status = ?1
              AND o.condition <> ?2
              AND o.thickness_mm = ?3
              AND UPPER(TRIM(m.category)) = ?4
            "#,
            OFFCUT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let offcuts = stmt
            .query_map(
                params![
                    OffcutStatus::Available.to_db_str(),
                    OffcutCondition::Damaged.to_db_str(),
                    thickness_mm,
                    category,
                ],
                map_offcut_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(offcuts)
    }

    /// 批次推荐候选: 同材料、同厚度、可用且未损坏
    pub fn list_candidates_by_material(
        &self,
        material_id: &str,
        thickness_mm: f64,
    ) -> RepositoryResult<Vec<Offcut>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT {}
            FROM offcut o
            WHERE o.deleted_at IS NULL
              AND o.status = ?1
              AND o.condition <> ?2
              AND o.material_id = ?3
              AND o.thickness_mm = ?4
            "#,
            OFFCUT_COLUMNS
        );

        let mut stmt = conn.prepare(&sql)?;
        let offcuts = stmt
            .query_map(
                params![
                    OffcutStatus::Available.to_db_str(),
                    OffcutCondition::Damaged.to_db_str(),
                    material_id,
                    thickness_mm,
                ],
                map_offcut_row,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(offcuts)
    }

    /// 查询余料的消耗记录 (时间正序)
    pub fn list_usages(&self, offcut_id: &str) -> RepositoryResult<Vec<OffcutUsage>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT usage_id, offcut_id, usage_type, used_area_mm2, used_width_mm,
                   used_height_mm, order_item_id, batch_id, notes,
                   created_by_user_id, created_at
            FROM offcut_usage
            WHERE offcut_id = ?1
            ORDER BY created_at, usage_id
            "#,
        )?;
        let usages = stmt
            .query_map(params![offcut_id], map_usage_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(usages)
    }

    /// 查询余料当前的预留
    pub fn list_reservations(&self, offcut_id: &str) -> RepositoryResult<Vec<OffcutReservation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT reservation_id, offcut_id, order_item_id, batch_id,
                   reserved_by_user_id, created_at
            FROM offcut_reservation
            WHERE offcut_id = ?1
            ORDER BY created_at, reservation_id
            "#,
        )?;
        let reservations = stmt
            .query_map(params![offcut_id], map_reservation_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(reservations)
    }
}
