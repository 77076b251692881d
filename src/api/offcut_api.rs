// ==========================================
// 激光切割车间 - 余料 API (生命周期管理)
// ==========================================
// 职责: 余料建档、编辑、预留、整块/部分使用、软删除、推荐查询
// 并发: 所有写操作在 BEGIN IMMEDIATE 事务内重读行并重新校验状态
//       并发争用同一余料时只有一个调用成功, 其余返回 Conflict, 不做内部重试
// ==========================================

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult};
use crate::config::config_manager::ConfigManager;
use crate::config::offcut_policy::OffcutPolicy;
use crate::db::open_sqlite_connection;
use crate::domain::offcut::{
    CreateOffcutInput, Offcut, OffcutListFilter, OffcutReservation, OffcutShape, OffcutUsage,
    ReservationFilter, ReserveOffcutInput, UpdateOffcutInput, UseFullInput, UsePartialInput,
};
use crate::domain::types::{OffcutStatus, UsageType};
use crate::engine::offcut_lifecycle::{
    derive_partial_usage, ensure_transition_allowed, LifecycleOperation,
};
use crate::engine::suggestion::{BatchGroupSuggestion, OffcutSuggestion, SuggestionEngine};
use crate::repository::catalog_repo::{CatalogLookup, CatalogRepository};
use crate::repository::error::RepositoryError;
use crate::repository::offcut_repo::OffcutRepository;

// ==========================================
// UsageOutcome - 使用操作结果
// ==========================================
/// 消耗记录 + 写入后的余料快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageOutcome {
    pub usage: OffcutUsage,
    pub offcut: Offcut,
    /// 本次一并删除的预留数
    pub released_reservations: usize,
}

// ==========================================
// OffcutApi
// ==========================================
pub struct OffcutApi {
    offcut_repo: Arc<OffcutRepository>,
    catalog: Arc<dyn CatalogLookup>,
    policy: OffcutPolicy,
    suggestion_engine: SuggestionEngine,
}

impl OffcutApi {
    /// 创建新的OffcutApi实例
    ///
    /// # 参数
    /// - offcut_repo: 余料仓储
    /// - catalog: 材料/订单行/批次查询
    /// - policy: 报废比例、安全余量、推荐上限
    pub fn new(
        offcut_repo: Arc<OffcutRepository>,
        catalog: Arc<dyn CatalogLookup>,
        policy: OffcutPolicy,
    ) -> Self {
        let suggestion_engine =
            SuggestionEngine::new(offcut_repo.clone(), catalog.clone(), policy.clone());
        Self {
            offcut_repo,
            catalog,
            policy,
            suggestion_engine,
        }
    }

    /// 基于共享连接装配 (策略从 config_kv 读取)
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ApiResult<Self> {
        let policy = ConfigManager::from_connection(conn.clone()).load_offcut_policy()?;
        let offcut_repo = Arc::new(OffcutRepository::from_connection(conn.clone()));
        let catalog: Arc<dyn CatalogLookup> = Arc::new(CatalogRepository::from_connection(conn));
        Ok(Self::new(offcut_repo, catalog, policy))
    }

    /// 打开独立连接并装配
    pub fn open(db_path: &str) -> ApiResult<Self> {
        let conn = open_sqlite_connection(db_path).map_err(RepositoryError::from)?;
        Self::from_connection(Arc::new(Mutex::new(conn)))
    }

    pub fn policy(&self) -> &OffcutPolicy {
        &self.policy
    }

    // ==========================================
    // 建档与编辑
    // ==========================================

    /// 新建余料
    ///
    /// # 规则
    /// - 矩形必须有宽高; 异形必须有估算面积或完整外接矩形 (否则 ValidationError)
    /// - 材料不存在返回 NotFound; 厚度缺省取材料厚度
    /// - 估算面积缺省时由宽高 (或外接矩形) 推导
    /// - 默认 status=AVAILABLE, condition=GOOD, quantity=1
    pub fn create(&self, input: CreateOffcutInput) -> ApiResult<Offcut> {
        let shape = OffcutShape::from_parts(
            input.shape_type,
            &input.shape_parts(),
            input.estimated_area_mm2,
        )
        .map_err(ApiError::ValidationError)?;

        if let Some(area) = input.estimated_area_mm2 {
            ensure_non_negative("estimated_area_mm2", area)?;
        }
        let quantity = input.quantity.unwrap_or(1);
        if quantity < 1 {
            return Err(ApiError::ValidationError(format!(
                "quantity 必须 >= 1, 实际={}",
                quantity
            )));
        }

        let material = self
            .catalog
            .find_material(&input.material_id)?
            .ok_or_else(|| ApiError::NotFound(format!("Material(id={})不存在", input.material_id)))?;

        let thickness_mm = input.thickness_mm.unwrap_or(material.thickness_mm);
        if !(thickness_mm.is_finite() && thickness_mm > 0.0) {
            return Err(ApiError::ValidationError(format!(
                "thickness_mm 必须为正数, 实际={}",
                thickness_mm
            )));
        }

        let estimated_area_mm2 = input
            .estimated_area_mm2
            .or_else(|| shape.effective_dims().map(|(w, h)| w * h));

        let now = Utc::now();
        let offcut = Offcut {
            offcut_id: Uuid::new_v4().to_string(),
            material_id: material.material_id,
            thickness_mm,
            shape,
            estimated_area_mm2,
            quantity,
            location_label: input.location_label,
            condition: input.condition.unwrap_or_default(),
            status: OffcutStatus::Available,
            source: input.source,
            notes: input.notes,
            created_by_user_id: input.created_by_user_id,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };

        self.offcut_repo.insert(&offcut)?;
        info!(
            offcut_id = %offcut.offcut_id,
            material_id = %offcut.material_id,
            shape_type = %offcut.shape.shape_type(),
            estimated_area_mm2 = ?offcut.estimated_area_mm2,
            "余料已建档"
        );
        Ok(offcut)
    }

    /// 编辑余料 (补丁语义, 状态不可编辑)
    pub fn update(&self, offcut_id: &str, patch: &UpdateOffcutInput) -> ApiResult<Offcut> {
        let updated = self
            .offcut_repo
            .with_locked_offcut(offcut_id, |tx, current| -> ApiResult<Offcut> {
                let mut next = current.apply_patch(patch).map_err(ApiError::ValidationError)?;
                next.updated_at = Utc::now();
                tx.write_offcut(&next)?;
                Ok(next)
            })?;

        info!(offcut_id, "余料已更新");
        Ok(updated)
    }

    /// 软删除: 置为 DISCARDED 并写入 deleted_at, 不可逆
    ///
    /// 已软删除的余料再次调用返回 NotFound
    pub fn soft_delete(&self, offcut_id: &str) -> ApiResult<()> {
        let released = self
            .offcut_repo
            .with_locked_offcut(offcut_id, |tx, _current| -> ApiResult<usize> {
                tx.mark_deleted(offcut_id, Utc::now())?;
                Ok(tx.delete_all_reservations(offcut_id)?)
            })?;

        info!(offcut_id, released_reservations = released, "余料已软删除");
        Ok(())
    }

    // ==========================================
    // 查询接口
    // ==========================================

    /// 查询单块余料 (软删除视为不存在)
    pub fn get(&self, offcut_id: &str) -> ApiResult<Offcut> {
        self.offcut_repo
            .find_by_id(offcut_id)?
            .ok_or_else(|| RepositoryError::offcut_not_found(offcut_id).into())
    }

    /// 按条件列出余料, 新建在前
    pub fn list(&self, filter: &OffcutListFilter) -> ApiResult<Vec<Offcut>> {
        Ok(self.offcut_repo.list(filter)?)
    }

    /// 消耗记录 (按时间正序)
    pub fn list_usages(&self, offcut_id: &str) -> ApiResult<Vec<OffcutUsage>> {
        self.get(offcut_id)?;
        Ok(self.offcut_repo.list_usages(offcut_id)?)
    }

    /// 当前预留
    pub fn list_reservations(&self, offcut_id: &str) -> ApiResult<Vec<OffcutReservation>> {
        self.get(offcut_id)?;
        Ok(self.offcut_repo.list_reservations(offcut_id)?)
    }

    // ==========================================
    // 生命周期操作
    // ==========================================

    /// 预留余料 (仅 AVAILABLE 可预留)
    pub fn reserve(
        &self,
        offcut_id: &str,
        input: &ReserveOffcutInput,
    ) -> ApiResult<OffcutReservation> {
        ensure_user(&input.user_id)?;

        let reservation = self.offcut_repo.with_locked_offcut(
            offcut_id,
            |tx, current| -> ApiResult<OffcutReservation> {
                guard_transition(&current, LifecycleOperation::Reserve)?;

                let now = Utc::now();
                let reservation = OffcutReservation {
                    reservation_id: Uuid::new_v4().to_string(),
                    offcut_id: current.offcut_id.clone(),
                    order_item_id: input.order_item_id.clone(),
                    batch_id: input.batch_id.clone(),
                    reserved_by_user_id: input.user_id.clone(),
                    created_at: now,
                };
                tx.insert_reservation(&reservation)?;
                tx.set_status(offcut_id, OffcutStatus::Reserved, now)?;
                Ok(reservation)
            },
        )?;

        info!(
            offcut_id,
            reservation_id = %reservation.reservation_id,
            order_item_id = ?reservation.order_item_id,
            batch_id = ?reservation.batch_id,
            "余料已预留"
        );
        Ok(reservation)
    }

    /// 释放预留
    ///
    /// 删除匹配条件的预留 (条件为空时全部删除);
    /// RESERVED 且已无剩余预留时回到 AVAILABLE
    pub fn release_reservation(
        &self,
        offcut_id: &str,
        filter: &ReservationFilter,
    ) -> ApiResult<Offcut> {
        let (offcut, released) = self.offcut_repo.with_locked_offcut(
            offcut_id,
            |tx, current| -> ApiResult<(Offcut, usize)> {
                guard_transition(&current, LifecycleOperation::ReleaseReservation)?;

                let released = tx.delete_matching_reservations(offcut_id, filter)?;
                let mut next = current;
                if next.status == OffcutStatus::Reserved && tx.reservations(offcut_id)?.is_empty()
                {
                    let now = Utc::now();
                    tx.set_status(offcut_id, OffcutStatus::Available, now)?;
                    next.status = OffcutStatus::Available;
                    next.updated_at = now;
                }
                Ok((next, released))
            },
        )?;

        info!(
            offcut_id,
            released_reservations = released,
            status = %offcut.status,
            "余料预留已释放"
        );
        Ok(offcut)
    }

    /// 整块使用
    ///
    /// 记录 FULL 消耗 (整块面积与尺寸), 置为 USED, 删除该余料全部预留
    pub fn use_full(&self, offcut_id: &str, input: &UseFullInput) -> ApiResult<UsageOutcome> {
        ensure_user(&input.user_id)?;

        let outcome =
            self.offcut_repo
                .with_locked_offcut(offcut_id, |tx, current| -> ApiResult<UsageOutcome> {
                    guard_transition(&current, LifecycleOperation::UseFull)?;

                    let now = Utc::now();
                    let dims = current.shape.effective_dims();
                    let usage = OffcutUsage {
                        usage_id: Uuid::new_v4().to_string(),
                        offcut_id: current.offcut_id.clone(),
                        usage_type: UsageType::Full,
                        used_area_mm2: current.effective_area(),
                        used_width_mm: dims.map(|d| d.0),
                        used_height_mm: dims.map(|d| d.1),
                        order_item_id: input.order_item_id.clone(),
                        batch_id: input.batch_id.clone(),
                        notes: input.notes.clone(),
                        created_by_user_id: input.user_id.clone(),
                        created_at: now,
                    };
                    tx.insert_usage(&usage)?;
                    tx.set_status(offcut_id, OffcutStatus::Used, now)?;
                    let released_reservations = tx.delete_all_reservations(offcut_id)?;

                    let mut offcut = current;
                    offcut.status = OffcutStatus::Used;
                    offcut.updated_at = now;
                    Ok(UsageOutcome {
                        usage,
                        offcut,
                        released_reservations,
                    })
                })?;

        info!(
            offcut_id,
            used_area_mm2 = ?outcome.usage.used_area_mm2,
            released_reservations = outcome.released_reservations,
            "余料已整块使用"
        );
        Ok(outcome)
    }

    /// 部分切用
    ///
    /// # 规则
    /// - 消耗面积: used_area_mm2 优先, 否则 宽×高, 否则未知
    /// - 剩余面积 = max(0, 原面积 − 消耗面积), 状态按报废比例派生
    /// - 面积未知时只记录消耗, 面积与状态不变
    /// - 仅删除与本次 order_item_id / batch_id 匹配的预留
    /// - RESERVED 余料剩余充足时保持 RESERVED, 即使预留已被清空;
    ///   需调用 release_reservation 才能回到 AVAILABLE 重新参与推荐
    pub fn use_partial(&self, offcut_id: &str, input: &UsePartialInput) -> ApiResult<UsageOutcome> {
        ensure_user(&input.user_id)?;
        for (field, value) in [
            ("used_area_mm2", input.used_area_mm2),
            ("used_width_mm", input.used_width_mm),
            ("used_height_mm", input.used_height_mm),
        ] {
            if let Some(v) = value {
                ensure_non_negative(field, v)?;
            }
        }

        let discard_ratio = self.policy.discard_ratio;
        let outcome =
            self.offcut_repo
                .with_locked_offcut(offcut_id, |tx, current| -> ApiResult<UsageOutcome> {
                    guard_transition(&current, LifecycleOperation::UsePartial)?;

                    let now = Utc::now();
                    let consumed = input.consumed_area_mm2();
                    let derived = derive_partial_usage(
                        current.effective_area(),
                        consumed,
                        current.status,
                        discard_ratio,
                    );

                    let usage = OffcutUsage {
                        usage_id: Uuid::new_v4().to_string(),
                        offcut_id: current.offcut_id.clone(),
                        usage_type: UsageType::Partial,
                        used_area_mm2: consumed,
                        used_width_mm: input.used_width_mm,
                        used_height_mm: input.used_height_mm,
                        order_item_id: input.order_item_id.clone(),
                        batch_id: input.batch_id.clone(),
                        notes: input.notes.clone(),
                        created_by_user_id: input.user_id.clone(),
                        created_at: now,
                    };
                    tx.insert_usage(&usage)?;

                    let area = derived
                        .remaining_area_mm2
                        .or(current.estimated_area_mm2);
                    tx.set_status_and_area(offcut_id, derived.next_status, area, now)?;
                    let released_reservations =
                        tx.delete_matching_reservations(offcut_id, &input.reservation_filter())?;

                    let mut offcut = current;
                    offcut.status = derived.next_status;
                    offcut.estimated_area_mm2 = area;
                    offcut.updated_at = now;
                    Ok(UsageOutcome {
                        usage,
                        offcut,
                        released_reservations,
                    })
                })?;

        info!(
            offcut_id,
            consumed_area_mm2 = ?outcome.usage.used_area_mm2,
            remaining_area_mm2 = ?outcome.offcut.estimated_area_mm2,
            status = %outcome.offcut.status,
            released_reservations = outcome.released_reservations,
            "余料已部分切用"
        );
        Ok(outcome)
    }

    // ==========================================
    // 推荐查询 (只读快照, 不加锁)
    // ==========================================

    /// 订单行的余料推荐, 按分数降序
    pub fn suggestions_for_order_item(
        &self,
        order_item_id: &str,
    ) -> ApiResult<Vec<OffcutSuggestion>> {
        Ok(self.suggestion_engine.suggest_for_order_item(order_item_id)?)
    }

    /// 批次的分组余料推荐, 组内按面积升序
    pub fn suggestions_for_batch(&self, batch_id: &str) -> ApiResult<Vec<BatchGroupSuggestion>> {
        Ok(self.suggestion_engine.suggest_for_batch(batch_id)?)
    }
}

// ==========================================
// 校验辅助
// ==========================================

/// 状态转换校验, 拒绝时记录 warn 并转为 Conflict
fn guard_transition(offcut: &Offcut, operation: LifecycleOperation) -> ApiResult<()> {
    ensure_transition_allowed(offcut, operation).map_err(|rejected| {
        warn!(
            offcut_id = %rejected.offcut_id,
            status = %rejected.status,
            operation = %rejected.operation,
            "余料状态不允许该操作"
        );
        ApiError::from(rejected)
    })
}

fn ensure_user(user_id: &str) -> ApiResult<()> {
    if user_id.trim().is_empty() {
        return Err(ApiError::InvalidInput("user_id 不能为空".to_string()));
    }
    Ok(())
}

fn ensure_non_negative(field: &str, value: f64) -> ApiResult<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ApiError::ValidationError(format!(
            "{} 不能为负数, 实际={}",
            field, value
        )))
    }
}
