// ==========================================
// 激光切割车间 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，并发写事务排队而不是立即失败
// - 提供 schema 初始化（幂等）
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 建表语句（全部 IF NOT EXISTS，可重复执行）
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

CREATE TABLE IF NOT EXISTS material (
    material_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    category TEXT NOT NULL,
    thickness_mm REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS product_template (
    template_id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    default_material_id TEXT REFERENCES material(material_id)
);

CREATE TABLE IF NOT EXISTS template_material_hint (
    hint_id INTEGER PRIMARY KEY AUTOINCREMENT,
    template_id TEXT NOT NULL REFERENCES product_template(template_id) ON DELETE CASCADE,
    material_id TEXT,
    avg_area_mm2_per_item REAL
);

CREATE TABLE IF NOT EXISTS order_item (
    order_item_id TEXT PRIMARY KEY,
    template_id TEXT REFERENCES product_template(template_id),
    material_id TEXT REFERENCES material(material_id),
    width_mm REAL,
    height_mm REAL,
    quantity INTEGER NOT NULL DEFAULT 1
);

CREATE TABLE IF NOT EXISTS production_batch_item (
    batch_id TEXT NOT NULL,
    order_item_id TEXT NOT NULL REFERENCES order_item(order_item_id) ON DELETE CASCADE,
    PRIMARY KEY (batch_id, order_item_id)
);

CREATE TABLE IF NOT EXISTS offcut (
    offcut_id TEXT PRIMARY KEY,
    material_id TEXT NOT NULL REFERENCES material(material_id),
    thickness_mm REAL NOT NULL,
    shape_type TEXT NOT NULL,
    width_mm REAL,
    height_mm REAL,
    bounding_box_width_mm REAL,
    bounding_box_height_mm REAL,
    estimated_area_mm2 REAL,
    quantity INTEGER NOT NULL DEFAULT 1 CHECK (quantity >= 1),
    location_label TEXT,
    condition TEXT NOT NULL DEFAULT 'GOOD',
    status TEXT NOT NULL DEFAULT 'AVAILABLE',
    source TEXT,
    notes TEXT,
    created_by_user_id TEXT,
    deleted_at TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_offcut_candidate
    ON offcut (material_id, thickness_mm, status);

CREATE TABLE IF NOT EXISTS offcut_reservation (
    reservation_id TEXT PRIMARY KEY,
    offcut_id TEXT NOT NULL REFERENCES offcut(offcut_id),
    order_item_id TEXT,
    batch_id TEXT,
    reserved_by_user_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_offcut_reservation_offcut
    ON offcut_reservation (offcut_id);

CREATE TABLE IF NOT EXISTS offcut_usage (
    usage_id TEXT PRIMARY KEY,
    offcut_id TEXT NOT NULL REFERENCES offcut(offcut_id),
    usage_type TEXT NOT NULL,
    used_area_mm2 REAL,
    used_width_mm REAL,
    used_height_mm REAL,
    order_item_id TEXT,
    batch_id TEXT,
    notes TEXT,
    created_by_user_id TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_offcut_usage_offcut
    ON offcut_usage (offcut_id);
"#;

/// 初始化 schema 并登记版本号（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }
}
