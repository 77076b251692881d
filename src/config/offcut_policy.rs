// ==========================================
// 激光切割车间 - 余料业务策略参数
// ==========================================
// 报废比例与安全余量为业务常量, 可由 config_kv 覆写
// ==========================================

use crate::domain::types::MaterialCategory;
use serde::{Deserialize, Serialize};

/// 默认报废比例: 部分切用后剩余面积低于原面积的 15% 即报废
pub const DEFAULT_DISCARD_RATIO: f64 = 0.15;

/// 默认单件/单组推荐上限
pub const DEFAULT_SUGGESTION_LIMIT: usize = 20;

/// 各材料大类的安全余量
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyMargins {
    pub plywood: f64,
    pub mdf: f64,
    pub acrylic: f64,
    pub mirror_acrylic: f64,
    pub default: f64,
}

impl Default for SafetyMargins {
    fn default() -> Self {
        Self {
            plywood: 0.10,
            mdf: 0.10,
            acrylic: 0.15,
            mirror_acrylic: 0.15,
            default: 0.10,
        }
    }
}

/// 余料策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OffcutPolicy {
    pub discard_ratio: f64,
    pub margins: SafetyMargins,
    pub suggestion_limit: usize,
}

impl Default for OffcutPolicy {
    fn default() -> Self {
        Self {
            discard_ratio: DEFAULT_DISCARD_RATIO,
            margins: SafetyMargins::default(),
            suggestion_limit: DEFAULT_SUGGESTION_LIMIT,
        }
    }
}

impl OffcutPolicy {
    /// 按材料大类取安全余量
    pub fn safety_margin(&self, category: &MaterialCategory) -> f64 {
        match category {
            MaterialCategory::Plywood => self.margins.plywood,
            MaterialCategory::Mdf => self.margins.mdf,
            MaterialCategory::Acrylic => self.margins.acrylic,
            MaterialCategory::MirrorAcrylic => self.margins.mirror_acrylic,
            MaterialCategory::Other(_) => self.margins.default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_margins_by_category() {
        let policy = OffcutPolicy::default();
        assert_eq!(policy.safety_margin(&MaterialCategory::Plywood), 0.10);
        assert_eq!(policy.safety_margin(&MaterialCategory::Mdf), 0.10);
        assert_eq!(policy.safety_margin(&MaterialCategory::Acrylic), 0.15);
        assert_eq!(policy.safety_margin(&MaterialCategory::MirrorAcrylic), 0.15);
        assert_eq!(
            policy.safety_margin(&MaterialCategory::Other("FELT".to_string())),
            0.10
        );
        assert_eq!(policy.discard_ratio, 0.15);
        assert_eq!(policy.suggestion_limit, 20);
    }
}
