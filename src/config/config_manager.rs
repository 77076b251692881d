// ==========================================
// 激光切割车间 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::offcut_policy::{OffcutPolicy, SafetyMargins};
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 读取并解析配置, 缺失或格式错误时取默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> RepositoryResult<T>
    where
        T: FromStr + Copy,
    {
        let Some(raw) = self.get_global_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(config_key = key, raw_value = %raw, "配置格式错误，使用默认值");
                Ok(default)
            }
        }
    }

    /// 读取比例类配置, 要求落在 [0, 1)
    fn get_ratio_or_default(&self, key: &str, default: f64) -> RepositoryResult<f64> {
        let value = self.get_parsed_or_default(key, default)?;
        if (0.0..1.0).contains(&value) {
            Ok(value)
        } else {
            tracing::warn!(config_key = key, value, "比例配置超出 [0, 1)，使用默认值");
            Ok(default)
        }
    }

    // ===== 余料策略配置 =====

    /// 加载余料策略
    pub fn load_offcut_policy(&self) -> RepositoryResult<OffcutPolicy> {
        let defaults = OffcutPolicy::default();
        let margins = SafetyMargins {
            plywood: self.get_ratio_or_default(config_keys::MARGIN_PLYWOOD, defaults.margins.plywood)?,
            mdf: self.get_ratio_or_default(config_keys::MARGIN_MDF, defaults.margins.mdf)?,
            acrylic: self.get_ratio_or_default(config_keys::MARGIN_ACRYLIC, defaults.margins.acrylic)?,
            mirror_acrylic: self.get_ratio_or_default(
                config_keys::MARGIN_MIRROR_ACRYLIC,
                defaults.margins.mirror_acrylic,
            )?,
            default: self.get_ratio_or_default(config_keys::MARGIN_DEFAULT, defaults.margins.default)?,
        };

        let suggestion_limit =
            self.get_parsed_or_default(config_keys::SUGGESTION_LIMIT, defaults.suggestion_limit)?;

        Ok(OffcutPolicy {
            discard_ratio: self.get_ratio_or_default(config_keys::DISCARD_RATIO, defaults.discard_ratio)?,
            margins,
            suggestion_limit: if suggestion_limit == 0 {
                defaults.suggestion_limit
            } else {
                suggestion_limit
            },
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 部分切用报废比例
    pub const DISCARD_RATIO: &str = "offcut_discard_ratio";

    // 安全余量（按材料大类）
    pub const MARGIN_PLYWOOD: &str = "offcut_margin_plywood";
    pub const MARGIN_MDF: &str = "offcut_margin_mdf";
    pub const MARGIN_ACRYLIC: &str = "offcut_margin_acrylic";
    pub const MARGIN_MIRROR_ACRYLIC: &str = "offcut_margin_mirror_acrylic";
    pub const MARGIN_DEFAULT: &str = "offcut_margin_default";

    // 推荐条数上限
    pub const SUGGESTION_LIMIT: &str = "offcut_suggestion_limit";
}
