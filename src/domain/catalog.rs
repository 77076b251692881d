// ==========================================
// 激光切割车间 - 外部目录视图
// ==========================================
// 材料 / 订单行 / 产品模板 的只读视图
// 用途: 需求推导与候选过滤, 本层不维护其生命周期
// ==========================================

use crate::domain::types::MaterialCategory;
use serde::{Deserialize, Serialize};

/// 材料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub material_id: String,
    pub name: String,
    pub category: MaterialCategory,
    pub thickness_mm: f64,
}

/// 模板的材料用量提示
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialHint {
    pub material_id: Option<String>,
    pub avg_area_mm2_per_item: Option<f64>,
}

/// 产品模板
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductTemplate {
    pub template_id: String,
    pub name: String,
    pub default_material_id: Option<String>,
    pub material_hints: Vec<MaterialHint>,
}

/// 订单行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_item_id: String,
    pub material_id: Option<String>,
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub quantity: i32,
    pub template: Option<ProductTemplate>,
}

impl OrderItem {
    /// 订单行自身材料, 缺省取模板默认材料
    pub fn resolved_material_id(&self) -> Option<&str> {
        self.material_id.as_deref().or_else(|| {
            self.template
                .as_ref()
                .and_then(|t| t.default_material_id.as_deref())
        })
    }
}
