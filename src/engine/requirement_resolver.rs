// ==========================================
// 激光切割车间 - 需求推导引擎
// ==========================================
// 职责: 由订单行(或批次)推导所需材料、厚度、尺寸与面积
// 输入: CatalogLookup 提供的订单行/模板/材料
// 输出: Requirement (单件) / BatchRequirement (按材料+厚度分组)
// 红线: 无法推导不是错误, 返回 None / 跳过
// ==========================================

use crate::config::offcut_policy::OffcutPolicy;
use crate::domain::catalog::{Material, OrderItem};
use crate::domain::types::MaterialCategory;
use crate::repository::catalog_repo::CatalogLookup;
use crate::repository::error::{RepositoryError, RepositoryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// Requirement - 单件需求
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub material_id: String,
    pub material_category: MaterialCategory,
    pub thickness_mm: f64,
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub area_mm2: Option<f64>,
    pub safety_margin: f64,
}

impl Requirement {
    /// 至少具备宽高或面积之一才可匹配
    pub fn is_matchable(&self) -> bool {
        self.area_mm2.is_some() || (self.width_mm.is_some() && self.height_mm.is_some())
    }
}

// ==========================================
// BatchRequirement - 批次分组需求
// ==========================================
// 组内取单件最大需求面积: 不做跨件拼排, 一块余料须独立覆盖最大件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequirement {
    pub material_id: String,
    pub material_category: MaterialCategory,
    pub thickness_mm: f64,
    pub required_area_mm2: Option<f64>,
    pub safety_margin: f64,
    pub order_item_ids: Vec<String>,
}

// ==========================================
// RequirementResolver
// ==========================================
pub struct RequirementResolver {
    catalog: Arc<dyn CatalogLookup>,
    policy: OffcutPolicy,
}

impl RequirementResolver {
    pub fn new(catalog: Arc<dyn CatalogLookup>, policy: OffcutPolicy) -> Self {
        Self { catalog, policy }
    }

    /// 推导单个订单行的需求
    ///
    /// # 返回
    /// - Ok(Some(req)): 可匹配的需求
    /// - Ok(None): 无法推导 (缺材料或缺尺寸/面积)
    /// - Err(NotFound): 订单行不存在
    pub fn resolve_order_item(&self, order_item_id: &str) -> RepositoryResult<Option<Requirement>> {
        let item = self
            .catalog
            .find_order_item(order_item_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "OrderItem".to_string(),
                id: order_item_id.to_string(),
            })?;

        let Some(material) = self.lookup_material(&item)? else {
            debug!(order_item_id, "订单行无法确定材料，跳过推荐");
            return Ok(None);
        };

        let requirement = self.build_requirement(&item, &material);
        if !requirement.is_matchable() {
            debug!(order_item_id, "订单行缺少尺寸与面积提示，跳过推荐");
            return Ok(None);
        }
        Ok(Some(requirement))
    }

    /// 推导批次的分组需求 (按 material_id + thickness_mm 分组)
    pub fn resolve_batch(&self, batch_id: &str) -> RepositoryResult<Vec<BatchRequirement>> {
        let items = self.catalog.list_batch_items(batch_id)?;
        let mut groups: BTreeMap<(String, u64), BatchRequirement> = BTreeMap::new();

        for item in &items {
            let Some(material) = self.lookup_material(item)? else {
                debug!(batch_id, order_item_id = %item.order_item_id, "批次订单行无法确定材料，忽略");
                continue;
            };

            let area = item_required_area(item, &material.material_id);
            let key = (material.material_id.clone(), material.thickness_mm.to_bits());
            let group = groups.entry(key).or_insert_with(|| BatchRequirement {
                material_id: material.material_id.clone(),
                material_category: material.category.clone(),
                thickness_mm: material.thickness_mm,
                required_area_mm2: None,
                safety_margin: self.policy.safety_margin(&material.category),
                order_item_ids: Vec::new(),
            });

            group.order_item_ids.push(item.order_item_id.clone());
            group.required_area_mm2 = match (group.required_area_mm2, area) {
                (Some(current), Some(a)) => Some(current.max(a)),
                (current, a) => current.or(a),
            };
        }

        Ok(groups.into_values().collect())
    }

    fn lookup_material(&self, item: &OrderItem) -> RepositoryResult<Option<Material>> {
        match item.resolved_material_id() {
            Some(material_id) => self.catalog.find_material(material_id),
            None => Ok(None),
        }
    }

    fn build_requirement(&self, item: &OrderItem, material: &Material) -> Requirement {
        Requirement {
            material_id: material.material_id.clone(),
            material_category: material.category.clone(),
            thickness_mm: material.thickness_mm,
            width_mm: item.width_mm,
            height_mm: item.height_mm,
            area_mm2: item_required_area(item, &material.material_id),
            safety_margin: self.policy.safety_margin(&material.category),
        }
    }
}

/// 单个订单行的需求面积
///
/// 1) 宽×高×数量
/// 2) 模板用量提示 avg_area_mm2_per_item × 数量 (优先取同材料的提示)
/// 3) 无法推导
pub fn item_required_area(item: &OrderItem, material_id: &str) -> Option<f64> {
    let quantity = f64::from(item.quantity.max(1));

    if let (Some(w), Some(h)) = (item.width_mm, item.height_mm) {
        return Some(w * h * quantity);
    }

    let hints = &item.template.as_ref()?.material_hints;
    let hint_area = hints
        .iter()
        .find(|h| h.material_id.as_deref() == Some(material_id) && h.avg_area_mm2_per_item.is_some())
        .or_else(|| hints.iter().find(|h| h.avg_area_mm2_per_item.is_some()))
        .and_then(|h| h.avg_area_mm2_per_item)?;

    Some(hint_area * quantity)
}
