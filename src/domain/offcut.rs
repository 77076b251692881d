// ==========================================
// 激光切割车间 - 余料领域模型
// ==========================================
// 实体: Offcut / OffcutReservation / OffcutUsage
// 红线: 状态只能经生命周期操作变更; 软删除记录不参与任何查询
// ==========================================

use crate::domain::types::{OffcutCondition, OffcutStatus, ShapeType, UsageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ==========================================
// OffcutShape - 余料形状 (带标签的变体)
// ==========================================
// 矩形必须有宽高; 异形的外接矩形可选
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffcutShape {
    Rectangle {
        width_mm: f64,
        height_mm: f64,
    },
    Irregular {
        bounding_box_width_mm: Option<f64>,
        bounding_box_height_mm: Option<f64>,
    },
}

/// 形状的扁平字段 (对应数据库列与输入DTO)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeParts {
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub bounding_box_width_mm: Option<f64>,
    pub bounding_box_height_mm: Option<f64>,
}

impl OffcutShape {
    /// 构造矩形,宽高必须为正
    pub fn rectangle(width_mm: Option<f64>, height_mm: Option<f64>) -> Result<Self, String> {
        match (width_mm, height_mm) {
            (Some(w), Some(h)) => {
                ensure_positive("width_mm", w)?;
                ensure_positive("height_mm", h)?;
                Ok(OffcutShape::Rectangle {
                    width_mm: w,
                    height_mm: h,
                })
            }
            _ => Err("矩形余料必须同时提供 width_mm 与 height_mm".to_string()),
        }
    }

    /// 构造异形,必须有估算面积或完整外接矩形
    pub fn irregular(
        bounding_box_width_mm: Option<f64>,
        bounding_box_height_mm: Option<f64>,
        estimated_area_mm2: Option<f64>,
    ) -> Result<Self, String> {
        if let Some(w) = bounding_box_width_mm {
            ensure_positive("bounding_box_width_mm", w)?;
        }
        if let Some(h) = bounding_box_height_mm {
            ensure_positive("bounding_box_height_mm", h)?;
        }
        let has_box = bounding_box_width_mm.is_some() && bounding_box_height_mm.is_some();
        if estimated_area_mm2.is_none() && !has_box {
            return Err("异形余料必须提供 estimated_area_mm2 或完整的外接矩形".to_string());
        }
        Ok(OffcutShape::Irregular {
            bounding_box_width_mm,
            bounding_box_height_mm,
        })
    }

    /// 按形状类型从扁平字段构造
    pub fn from_parts(
        shape_type: ShapeType,
        parts: &ShapeParts,
        estimated_area_mm2: Option<f64>,
    ) -> Result<Self, String> {
        match shape_type {
            ShapeType::Rectangle => Self::rectangle(parts.width_mm, parts.height_mm),
            ShapeType::Irregular => Self::irregular(
                parts.bounding_box_width_mm,
                parts.bounding_box_height_mm,
                estimated_area_mm2,
            ),
        }
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            OffcutShape::Rectangle { .. } => ShapeType::Rectangle,
            OffcutShape::Irregular { .. } => ShapeType::Irregular,
        }
    }

    pub fn to_parts(&self) -> ShapeParts {
        match *self {
            OffcutShape::Rectangle {
                width_mm,
                height_mm,
            } => ShapeParts {
                width_mm: Some(width_mm),
                height_mm: Some(height_mm),
                ..ShapeParts::default()
            },
            OffcutShape::Irregular {
                bounding_box_width_mm,
                bounding_box_height_mm,
            } => ShapeParts {
                bounding_box_width_mm,
                bounding_box_height_mm,
                ..ShapeParts::default()
            },
        }
    }

    /// 有效宽高: 矩形取实际尺寸, 异形取外接矩形
    pub fn effective_dims(&self) -> Option<(f64, f64)> {
        match *self {
            OffcutShape::Rectangle {
                width_mm,
                height_mm,
            } => Some((width_mm, height_mm)),
            OffcutShape::Irregular {
                bounding_box_width_mm: Some(w),
                bounding_box_height_mm: Some(h),
            } => Some((w, h)),
            OffcutShape::Irregular { .. } => None,
        }
    }
}

fn ensure_positive(field: &str, value: f64) -> Result<(), String> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(format!("{} 必须为正数, 实际={}", field, value))
    }
}

// ==========================================
// Offcut - 余料
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offcut {
    // ===== 主键与材料 =====
    pub offcut_id: String,
    pub material_id: String,
    pub thickness_mm: f64,

    // ===== 形状与面积 =====
    pub shape: OffcutShape,
    pub estimated_area_mm2: Option<f64>, // 部分切用后递减
    pub quantity: i32,

    // ===== 库存信息 =====
    pub location_label: Option<String>,
    pub condition: OffcutCondition,
    pub status: OffcutStatus,
    pub source: Option<String>,
    pub notes: Option<String>,

    // ===== 审计字段 =====
    pub created_by_user_id: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>, // 软删除标记
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Offcut {
    /// 有效面积: 估算面积优先, 否则取有效宽高乘积
    pub fn effective_area(&self) -> Option<f64> {
        self.estimated_area_mm2
            .or_else(|| self.shape.effective_dims().map(|(w, h)| w * h))
    }

    /// 按补丁语义生成更新后的余料 (不触碰状态)
    ///
    /// 仅显式出现的字段会被覆盖; 可空字段区分"缺省"与"置空"。
    /// 更新后重新校验形状必填字段。
    pub fn apply_patch(&self, patch: &UpdateOffcutInput) -> Result<Offcut, String> {
        let mut next = self.clone();
        let mut parts = self.shape.to_parts();
        let shape_type = patch.shape_type.unwrap_or_else(|| self.shape.shape_type());

        if let Some(v) = patch.width_mm {
            parts.width_mm = v;
        }
        if let Some(v) = patch.height_mm {
            parts.height_mm = v;
        }
        if let Some(v) = patch.bounding_box_width_mm {
            parts.bounding_box_width_mm = v;
        }
        if let Some(v) = patch.bounding_box_height_mm {
            parts.bounding_box_height_mm = v;
        }
        if let Some(v) = patch.estimated_area_mm2 {
            if let Some(area) = v {
                if !(area.is_finite() && area >= 0.0) {
                    return Err(format!("estimated_area_mm2 不能为负数, 实际={}", area));
                }
            }
            next.estimated_area_mm2 = v;
        }
        next.shape = OffcutShape::from_parts(shape_type, &parts, next.estimated_area_mm2)?;

        if let Some(t) = patch.thickness_mm {
            ensure_positive("thickness_mm", t)?;
            next.thickness_mm = t;
        }
        if let Some(q) = patch.quantity {
            if q < 1 {
                return Err(format!("quantity 必须 >= 1, 实际={}", q));
            }
            next.quantity = q;
        }
        if let Some(c) = patch.condition {
            next.condition = c;
        }
        if let Some(ref v) = patch.location_label {
            next.location_label = v.clone();
        }
        if let Some(ref v) = patch.source {
            next.source = v.clone();
        }
        if let Some(ref v) = patch.notes {
            next.notes = v.clone();
        }

        Ok(next)
    }
}

// ==========================================
// OffcutReservation - 余料预留
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffcutReservation {
    pub reservation_id: String,
    pub offcut_id: String,
    pub order_item_id: Option<String>,
    pub batch_id: Option<String>,
    pub reserved_by_user_id: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// OffcutUsage - 余料消耗记录 (只增不改)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffcutUsage {
    pub usage_id: String,
    pub offcut_id: String,
    pub usage_type: UsageType,
    pub used_area_mm2: Option<f64>,
    pub used_width_mm: Option<f64>,
    pub used_height_mm: Option<f64>,
    pub order_item_id: Option<String>,
    pub batch_id: Option<String>,
    pub notes: Option<String>,
    pub created_by_user_id: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// 输入 DTO
// ==========================================

/// 新建余料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOffcutInput {
    pub material_id: String,
    #[serde(default)]
    pub thickness_mm: Option<f64>, // 缺省取材料厚度
    pub shape_type: ShapeType,
    #[serde(default)]
    pub width_mm: Option<f64>,
    #[serde(default)]
    pub height_mm: Option<f64>,
    #[serde(default)]
    pub bounding_box_width_mm: Option<f64>,
    #[serde(default)]
    pub bounding_box_height_mm: Option<f64>,
    #[serde(default)]
    pub estimated_area_mm2: Option<f64>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub location_label: Option<String>,
    #[serde(default)]
    pub condition: Option<OffcutCondition>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_by_user_id: Option<String>,
}

impl CreateOffcutInput {
    pub fn shape_parts(&self) -> ShapeParts {
        ShapeParts {
            width_mm: self.width_mm,
            height_mm: self.height_mm,
            bounding_box_width_mm: self.bounding_box_width_mm,
            bounding_box_height_mm: self.bounding_box_height_mm,
        }
    }
}

/// 更新余料 (补丁语义)
///
/// 外层 None = 字段缺省(不修改); Some(None) = 显式置空
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateOffcutInput {
    #[serde(default)]
    pub thickness_mm: Option<f64>,
    #[serde(default)]
    pub shape_type: Option<ShapeType>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub width_mm: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub height_mm: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub bounding_box_width_mm: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub bounding_box_height_mm: Option<Option<f64>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub estimated_area_mm2: Option<Option<f64>>,
    #[serde(default)]
    pub quantity: Option<i32>,
    #[serde(default)]
    pub condition: Option<OffcutCondition>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub location_label: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub source: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub notes: Option<Option<String>>,
}

// 字段出现即为 Some, 使 null 得以与缺省区分
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

/// 预留/释放时的匹配条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReservationFilter {
    #[serde(default)]
    pub order_item_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
}

/// 预留余料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveOffcutInput {
    #[serde(default)]
    pub order_item_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    pub user_id: String,
}

/// 整块使用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UseFullInput {
    #[serde(default)]
    pub order_item_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub user_id: String,
}

/// 部分切用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsePartialInput {
    #[serde(default)]
    pub used_area_mm2: Option<f64>,
    #[serde(default)]
    pub used_width_mm: Option<f64>,
    #[serde(default)]
    pub used_height_mm: Option<f64>,
    #[serde(default)]
    pub order_item_id: Option<String>,
    #[serde(default)]
    pub batch_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub user_id: String,
}

impl UsePartialInput {
    /// 本次消耗面积: 显式面积优先, 否则宽×高, 否则未知
    pub fn consumed_area_mm2(&self) -> Option<f64> {
        self.used_area_mm2.or(match (self.used_width_mm, self.used_height_mm) {
            (Some(w), Some(h)) => Some(w * h),
            _ => None,
        })
    }

    pub fn reservation_filter(&self) -> ReservationFilter {
        ReservationFilter {
            order_item_id: self.order_item_id.clone(),
            batch_id: self.batch_id.clone(),
        }
    }
}

/// 余料列表过滤条件 (软删除记录始终排除)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OffcutListFilter {
    #[serde(default)]
    pub material_id: Option<String>,
    #[serde(default)]
    pub thickness_mm: Option<f64>,
    #[serde(default)]
    pub status: Option<OffcutStatus>,
    #[serde(default)]
    pub condition: Option<OffcutCondition>,
    #[serde(default)]
    pub location_label: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_rectangle() -> Offcut {
        Offcut {
            offcut_id: "OC1".to_string(),
            material_id: "MAT1".to_string(),
            thickness_mm: 3.0,
            shape: OffcutShape::Rectangle {
                width_mm: 200.0,
                height_mm: 100.0,
            },
            estimated_area_mm2: Some(20_000.0),
            quantity: 1,
            location_label: Some("R1".to_string()),
            condition: OffcutCondition::Good,
            status: OffcutStatus::Available,
            source: None,
            notes: Some("old".to_string()),
            created_by_user_id: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_rectangle_requires_both_dims() {
        assert!(OffcutShape::rectangle(Some(10.0), None).is_err());
        assert!(OffcutShape::rectangle(Some(10.0), Some(0.0)).is_err());
        assert!(OffcutShape::rectangle(Some(10.0), Some(5.0)).is_ok());
    }

    #[test]
    fn test_irregular_requires_area_or_box() {
        assert!(OffcutShape::irregular(None, None, None).is_err());
        assert!(OffcutShape::irregular(Some(10.0), None, None).is_err());
        assert!(OffcutShape::irregular(Some(10.0), Some(20.0), None).is_ok());
        assert!(OffcutShape::irregular(None, None, Some(500.0)).is_ok());
    }

    #[test]
    fn test_effective_area_falls_back_to_dims() {
        let mut offcut = sample_rectangle();
        offcut.estimated_area_mm2 = None;
        assert_eq!(offcut.effective_area(), Some(20_000.0));

        offcut.shape = OffcutShape::Irregular {
            bounding_box_width_mm: None,
            bounding_box_height_mm: None,
        };
        assert_eq!(offcut.effective_area(), None);
    }

    #[test]
    fn test_patch_distinguishes_absent_and_null() {
        let offcut = sample_rectangle();
        let patch: UpdateOffcutInput =
            serde_json::from_str(r#"{"notes": null, "quantity": 3}"#).unwrap();
        assert_eq!(patch.notes, Some(None));
        assert_eq!(patch.location_label, None);

        let next = offcut.apply_patch(&patch).unwrap();
        assert_eq!(next.notes, None);
        assert_eq!(next.location_label, Some("R1".to_string()));
        assert_eq!(next.quantity, 3);
        assert_eq!(next.status, OffcutStatus::Available);
    }

    #[test]
    fn test_patch_cannot_strip_rectangle_dims() {
        let offcut = sample_rectangle();
        let patch: UpdateOffcutInput = serde_json::from_str(r#"{"width_mm": null}"#).unwrap();
        assert!(offcut.apply_patch(&patch).is_err());
    }

    #[test]
    fn test_consumed_area_priority() {
        let input = UsePartialInput {
            used_area_mm2: None,
            used_width_mm: Some(10.0),
            used_height_mm: Some(20.0),
            order_item_id: None,
            batch_id: None,
            notes: None,
            user_id: "u1".to_string(),
        };
        assert_eq!(input.consumed_area_mm2(), Some(200.0));

        let explicit = UsePartialInput {
            used_area_mm2: Some(50.0),
            ..input.clone()
        };
        assert_eq!(explicit.consumed_area_mm2(), Some(50.0));

        let unknown = UsePartialInput {
            used_height_mm: None,
            ..input
        };
        assert_eq!(unknown.consumed_area_mm2(), None);
    }
}
