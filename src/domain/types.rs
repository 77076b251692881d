// ==========================================
// 激光切割车间 - 余料领域类型定义
// ==========================================
// 职责: 余料状态、成色、形状、消耗类型、材料大类
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 余料状态 (Offcut Status)
// ==========================================
// 状态只能通过生命周期操作变更,不允许直接覆写
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffcutStatus {
    Available, // 可用
    Reserved,  // 已预留
    Used,      // 已用完(终态)
    Discarded, // 已报废(终态)
}

impl OffcutStatus {
    /// 从数据库字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AVAILABLE" => Some(OffcutStatus::Available),
            "RESERVED" => Some(OffcutStatus::Reserved),
            "USED" => Some(OffcutStatus::Used),
            "DISCARDED" => Some(OffcutStatus::Discarded),
            _ => None,
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            OffcutStatus::Available => "AVAILABLE",
            OffcutStatus::Reserved => "RESERVED",
            OffcutStatus::Used => "USED",
            OffcutStatus::Discarded => "DISCARDED",
        }
    }

    /// 是否为终态 (USED / DISCARDED)
    pub fn is_terminal(&self) -> bool {
        matches!(self, OffcutStatus::Used | OffcutStatus::Discarded)
    }
}

impl fmt::Display for OffcutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 余料成色 (Offcut Condition)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OffcutCondition {
    Good,    // 完好
    Fair,    // 轻微划痕
    Poor,    // 明显瑕疵
    Damaged, // 损坏(不参与推荐)
}

impl Default for OffcutCondition {
    fn default() -> Self {
        OffcutCondition::Good
    }
}

impl OffcutCondition {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GOOD" => Some(OffcutCondition::Good),
            "FAIR" => Some(OffcutCondition::Fair),
            "POOR" => Some(OffcutCondition::Poor),
            "DAMAGED" => Some(OffcutCondition::Damaged),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            OffcutCondition::Good => "GOOD",
            OffcutCondition::Fair => "FAIR",
            OffcutCondition::Poor => "POOR",
            OffcutCondition::Damaged => "DAMAGED",
        }
    }
}

impl fmt::Display for OffcutCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 余料形状类型 (Shape Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShapeType {
    Rectangle, // 矩形
    Irregular, // 异形
}

impl ShapeType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "RECTANGLE" => Some(ShapeType::Rectangle),
            "IRREGULAR" => Some(ShapeType::Irregular),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ShapeType::Rectangle => "RECTANGLE",
            ShapeType::Irregular => "IRREGULAR",
        }
    }
}

impl fmt::Display for ShapeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 消耗类型 (Usage Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageType {
    Full,    // 整块用完
    Partial, // 部分切用
}

impl UsageType {
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "FULL" => Some(UsageType::Full),
            "PARTIAL" => Some(UsageType::Partial),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            UsageType::Full => "FULL",
            UsageType::Partial => "PARTIAL",
        }
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

// ==========================================
// 材料大类 (Material Category)
// ==========================================
// 用途: 安全余量按材料大类取值
// 未知大类统一归入 Other,保留原始字符串便于比对
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MaterialCategory {
    Plywood,       // 胶合板
    Mdf,           // 中密度板
    Acrylic,       // 亚克力
    MirrorAcrylic, // 镜面亚克力
    Other(String),
}

impl MaterialCategory {
    /// 从数据库字符串解析 (未知值归入 Other)
    pub fn from_db_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "PLYWOOD" => MaterialCategory::Plywood,
            "MDF" => MaterialCategory::Mdf,
            "ACRYLIC" => MaterialCategory::Acrylic,
            "MIRROR_ACRYLIC" => MaterialCategory::MirrorAcrylic,
            other => MaterialCategory::Other(other.to_string()),
        }
    }

    pub fn to_db_str(&self) -> &str {
        match self {
            MaterialCategory::Plywood => "PLYWOOD",
            MaterialCategory::Mdf => "MDF",
            MaterialCategory::Acrylic => "ACRYLIC",
            MaterialCategory::MirrorAcrylic => "MIRROR_ACRYLIC",
            MaterialCategory::Other(s) => s.as_str(),
        }
    }
}

impl fmt::Display for MaterialCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_db_roundtrip_and_terminal() {
        for status in [
            OffcutStatus::Available,
            OffcutStatus::Reserved,
            OffcutStatus::Used,
            OffcutStatus::Discarded,
        ] {
            assert_eq!(OffcutStatus::from_db_str(status.to_db_str()), Some(status));
        }
        assert!(OffcutStatus::Used.is_terminal());
        assert!(OffcutStatus::Discarded.is_terminal());
        assert!(!OffcutStatus::Reserved.is_terminal());
        assert_eq!(OffcutStatus::from_db_str("LOST"), None);
    }

    #[test]
    fn test_material_category_keeps_unknown_text() {
        assert_eq!(MaterialCategory::from_db_str("mdf"), MaterialCategory::Mdf);
        assert_eq!(
            MaterialCategory::from_db_str("mirror_acrylic"),
            MaterialCategory::MirrorAcrylic
        );
        let other = MaterialCategory::from_db_str("LEATHER");
        assert_eq!(other.to_db_str(), "LEATHER");
    }
}
