// ==========================================
// 激光切割车间 - 余料适配评分引擎
// ==========================================
// 职责: 判定单块余料对单个需求的适配等级并打分
// 规则: 按顺序匹配, 首个命中的规则决定基础分
//   1) 正向尺寸满足          100  "Fits exact size"
//   2) 旋转90°尺寸满足       100  "Fits rotated"
//   3) 面积 ≥ 需求×(1+余量)   60  "Area likely sufficient"
//   4) 面积 ≥ 需求           30  "Potential risk"
// 加分: 成色 GOOD +10; 面积越小附加分越高 (同等级内少浪费优先)
// 红线: 不做二维排样, 只看外接尺寸与面积
// ==========================================

use crate::domain::offcut::Offcut;
use crate::domain::types::OffcutCondition;
use crate::engine::requirement_resolver::Requirement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 成色 GOOD 加分
pub const GOOD_CONDITION_BONUS: f64 = 10.0;

/// 面积附加分的归一化上限 (mm², 10m × 10m)
///
/// 附加分 = max(0, 上限 − 面积) / 上限, 取值 [0, 1], 不会跨越等级与成色加分
pub const TIE_BREAK_AREA_CEILING_MM2: f64 = 1.0e8;

// ==========================================
// FitReason - 适配原因
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitReason {
    ExactSize,
    Rotated,
    AreaSufficient,
    PotentialRisk,
}

impl FitReason {
    pub fn label(&self) -> &'static str {
        match self {
            FitReason::ExactSize => "Fits exact size",
            FitReason::Rotated => "Fits rotated",
            FitReason::AreaSufficient => "Area likely sufficient",
            FitReason::PotentialRisk => "Potential risk",
        }
    }
}

impl fmt::Display for FitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// 评分结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitScore {
    pub fit_reason: FitReason,
    pub score: f64,
}

// ==========================================
// 评分输入
// ==========================================

/// 需求侧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitRequirement {
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub area_mm2: Option<f64>,
    pub safety_margin: f64,
}

impl From<&Requirement> for FitRequirement {
    fn from(req: &Requirement) -> Self {
        Self {
            width_mm: req.width_mm,
            height_mm: req.height_mm,
            area_mm2: req.area_mm2,
            safety_margin: req.safety_margin,
        }
    }
}

/// 候选侧 (有效宽高 = 实际尺寸或外接矩形; 有效面积 = 估算面积或宽高乘积)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitCandidate {
    pub width_mm: Option<f64>,
    pub height_mm: Option<f64>,
    pub area_mm2: Option<f64>,
    pub condition: OffcutCondition,
}

impl From<&Offcut> for FitCandidate {
    fn from(offcut: &Offcut) -> Self {
        let dims = offcut.shape.effective_dims();
        Self {
            width_mm: dims.map(|d| d.0),
            height_mm: dims.map(|d| d.1),
            area_mm2: offcut.effective_area(),
            condition: offcut.condition,
        }
    }
}

// ==========================================
// 规则表
// ==========================================

struct FitRule {
    reason: FitReason,
    base_score: f64,
    applies: fn(&FitRequirement, &FitCandidate) -> bool,
}

static FIT_RULES: [FitRule; 4] = [
    FitRule {
        reason: FitReason::ExactSize,
        base_score: 100.0,
        applies: fits_straight,
    },
    FitRule {
        reason: FitReason::Rotated,
        base_score: 100.0,
        applies: fits_rotated,
    },
    FitRule {
        reason: FitReason::AreaSufficient,
        base_score: 60.0,
        applies: area_with_margin,
    },
    FitRule {
        reason: FitReason::PotentialRisk,
        base_score: 30.0,
        applies: area_bare,
    },
];

fn dims(req: &FitRequirement, cand: &FitCandidate) -> Option<(f64, f64, f64, f64)> {
    Some((req.width_mm?, req.height_mm?, cand.width_mm?, cand.height_mm?))
}

fn fits_straight(req: &FitRequirement, cand: &FitCandidate) -> bool {
    dims(req, cand).map_or(false, |(rw, rh, cw, ch)| cw >= rw && ch >= rh)
}

fn fits_rotated(req: &FitRequirement, cand: &FitCandidate) -> bool {
    dims(req, cand).map_or(false, |(rw, rh, cw, ch)| cw >= rh && ch >= rw)
}

fn area_with_margin(req: &FitRequirement, cand: &FitCandidate) -> bool {
    match (req.area_mm2, cand.area_mm2) {
        (Some(ra), Some(ca)) => ca >= ra * (1.0 + req.safety_margin),
        _ => false,
    }
}

fn area_bare(req: &FitRequirement, cand: &FitCandidate) -> bool {
    match (req.area_mm2, cand.area_mm2) {
        (Some(ra), Some(ca)) => ca >= ra,
        _ => false,
    }
}

// ==========================================
// FitScorer
// ==========================================
pub struct FitScorer {
    // 无状态引擎
}

impl Default for FitScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl FitScorer {
    pub fn new() -> Self {
        Self {}
    }

    /// 对单个候选评分, 无规则命中返回 None
    pub fn score(&self, req: &FitRequirement, cand: &FitCandidate) -> Option<FitScore> {
        let rule = FIT_RULES.iter().find(|rule| (rule.applies)(req, cand))?;

        let mut score = rule.base_score;
        if cand.condition == OffcutCondition::Good {
            score += GOOD_CONDITION_BONUS;
        }
        if let Some(area) = cand.area_mm2 {
            score += (TIE_BREAK_AREA_CEILING_MM2 - area).max(0.0) / TIE_BREAK_AREA_CEILING_MM2;
        }

        Some(FitScore {
            fit_reason: rule.reason,
            score,
        })
    }
}
