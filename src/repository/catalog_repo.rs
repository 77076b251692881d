// ==========================================
// 激光切割车间 - 目录查询仓储
// ==========================================
// 材料 / 订单行(含模板与用量提示) / 生产批次
// 本模块只读: 这些实体由外部模块维护
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::catalog::{Material, MaterialHint, OrderItem, ProductTemplate};
use crate::domain::types::MaterialCategory;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult};
use std::sync::{Arc, Mutex};

// ==========================================
// CatalogLookup - 目录查询接口
// ==========================================
// 引擎只依赖该接口, 便于替换为其他数据源
pub trait CatalogLookup: Send + Sync {
    /// 按 material_id 查询材料
    fn find_material(&self, material_id: &str) -> RepositoryResult<Option<Material>>;

    /// 按 order_item_id 查询订单行 (带模板与用量提示)
    fn find_order_item(&self, order_item_id: &str) -> RepositoryResult<Option<OrderItem>>;

    /// 查询批次关联的全部订单行
    fn list_batch_items(&self, batch_id: &str) -> RepositoryResult<Vec<OrderItem>>;
}

// ==========================================
// CatalogRepository - SQLite 实现
// ==========================================
pub struct CatalogRepository {
    conn: Arc<Mutex<Connection>>,
}

/// order_item 原始行 (模板尚未装配)
struct OrderItemRow {
    order_item_id: String,
    template_id: Option<String>,
    material_id: Option<String>,
    width_mm: Option<f64>,
    height_mm: Option<f64>,
    quantity: i32,
}

impl CatalogRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    fn load_template(
        conn: &Connection,
        template_id: &str,
    ) -> RepositoryResult<Option<ProductTemplate>> {
        let head = conn
            .query_row(
                "SELECT template_id, name, default_material_id FROM product_template WHERE template_id = ?1",
                params![template_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                    ))
                },
            )
            .optional()?;

        let Some((template_id, name, default_material_id)) = head else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            r#"
            SELECT material_id, avg_area_mm2_per_item
            FROM template_material_hint
            WHERE template_id = ?1
            ORDER BY hint_id
            "#,
        )?;
        let material_hints = stmt
            .query_map(params![template_id], |row| {
                Ok(MaterialHint {
                    material_id: row.get(0)?,
                    avg_area_mm2_per_item: row.get(1)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(Some(ProductTemplate {
            template_id,
            name,
            default_material_id,
            material_hints,
        }))
    }

    fn assemble(conn: &Connection, row: OrderItemRow) -> RepositoryResult<OrderItem> {
        let template = match row.template_id {
            Some(ref template_id) => Self::load_template(conn, template_id)?,
            None => None,
        };
        Ok(OrderItem {
            order_item_id: row.order_item_id,
            material_id: row.material_id,
            width_mm: row.width_mm,
            height_mm: row.height_mm,
            quantity: row.quantity,
            template,
        })
    }

    fn map_order_item_row(row: &rusqlite::Row) -> SqliteResult<OrderItemRow> {
        Ok(OrderItemRow {
            order_item_id: row.get(0)?,
            template_id: row.get(1)?,
            material_id: row.get(2)?,
            width_mm: row.get(3)?,
            height_mm: row.get(4)?,
            quantity: row.get(5)?,
        })
    }
}

impl CatalogLookup for CatalogRepository {
    fn find_material(&self, material_id: &str) -> RepositoryResult<Option<Material>> {
        let conn = self.get_conn()?;
        let material = conn
            .query_row(
                "SELECT material_id, name, category, thickness_mm FROM material WHERE material_id = ?1",
                params![material_id],
                |row| {
                    Ok(Material {
                        material_id: row.get(0)?,
                        name: row.get(1)?,
                        category: MaterialCategory::from_db_str(&row.get::<_, String>(2)?),
                        thickness_mm: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(material)
    }

    fn find_order_item(&self, order_item_id: &str) -> RepositoryResult<Option<OrderItem>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT order_item_id, template_id, material_id, width_mm, height_mm, quantity
                FROM order_item
                WHERE order_item_id = ?1
                "#,
                params![order_item_id],
                Self::map_order_item_row,
            )
            .optional()?;

        match row {
            Some(row) => Ok(Some(Self::assemble(&conn, row)?)),
            None => Ok(None),
        }
    }

    fn list_batch_items(&self, batch_id: &str) -> RepositoryResult<Vec<OrderItem>> {
        let conn = self.get_conn()?;
        let rows = {
            let mut stmt = conn.prepare(
                r#"
                SELECT oi.order_item_id, oi.template_id, oi.material_id,
                       oi.width_mm, oi.height_mm, oi.quantity
                FROM production_batch_item bi
                JOIN order_item oi ON oi.order_item_id = bi.order_item_id
                WHERE bi.batch_id = ?1
                ORDER BY oi.order_item_id
                "#,
            )?;
            let rows = stmt
                .query_map(params![batch_id], Self::map_order_item_row)?
                .collect::<SqliteResult<Vec<_>>>()?;
            rows
        };

        rows.into_iter()
            .map(|row| Self::assemble(&conn, row))
            .collect()
    }
}
