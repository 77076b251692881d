// ==========================================
// 激光切割车间 - 余料生命周期规则
// ==========================================
// 状态机:
//   AVAILABLE --reserve--> RESERVED
//   AVAILABLE/RESERVED --use_full--> USED (终态)
//   AVAILABLE/RESERVED --use_partial--> 面积递减, 视剩余比例派生状态
//   任意 --soft_delete--> DISCARDED + deleted_at (不可逆)
// 红线: 本模块只做判定, 不做读写; 调用方须在同一事务内重读后再判定
// ==========================================

use crate::domain::offcut::Offcut;
use crate::domain::types::OffcutStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ==========================================
// LifecycleOperation - 生命周期操作
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleOperation {
    Reserve,
    ReleaseReservation,
    UseFull,
    UsePartial,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleOperation::Reserve => write!(f, "RESERVE"),
            LifecycleOperation::ReleaseReservation => write!(f, "RELEASE_RESERVATION"),
            LifecycleOperation::UseFull => write!(f, "USE_FULL"),
            LifecycleOperation::UsePartial => write!(f, "USE_PARTIAL"),
        }
    }
}

/// 非法状态转换
#[derive(Error, Debug, Clone, PartialEq)]
#[error("余料 {offcut_id} 当前状态 {status} 不允许执行 {operation}")]
pub struct TransitionRejected {
    pub offcut_id: String,
    pub status: OffcutStatus,
    pub operation: LifecycleOperation,
}

/// 校验状态转换
///
/// - 预留: 仅 AVAILABLE
/// - 使用/释放: 非终态 (AVAILABLE / RESERVED)
pub fn ensure_transition_allowed(
    offcut: &Offcut,
    operation: LifecycleOperation,
) -> Result<(), TransitionRejected> {
    let allowed = match operation {
        LifecycleOperation::Reserve => offcut.status == OffcutStatus::Available,
        LifecycleOperation::ReleaseReservation
        | LifecycleOperation::UseFull
        | LifecycleOperation::UsePartial => !offcut.status.is_terminal(),
    };

    if allowed {
        Ok(())
    } else {
        Err(TransitionRejected {
            offcut_id: offcut.offcut_id.clone(),
            status: offcut.status,
            operation,
        })
    }
}

// ==========================================
// 部分切用结果推导
// ==========================================

/// 部分切用的推导结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PartialUsageOutcome {
    /// 新的估算面积; None 表示面积不可计算, 保持原值
    pub remaining_area_mm2: Option<f64>,
    pub next_status: OffcutStatus,
}

/// 推导部分切用后的剩余面积与状态
///
/// - remaining = max(0, prior − consumed), 从不增加、从不为负
/// - remaining ≤ 0 → USED
/// - 0 < remaining < discard_ratio × prior → DISCARDED
/// - 其余保持当前状态
/// - prior 或 consumed 未知时面积与状态均不变
pub fn derive_partial_usage(
    prior_area_mm2: Option<f64>,
    consumed_area_mm2: Option<f64>,
    current_status: OffcutStatus,
    discard_ratio: f64,
) -> PartialUsageOutcome {
    let (Some(prior), Some(consumed)) = (prior_area_mm2, consumed_area_mm2) else {
        return PartialUsageOutcome {
            remaining_area_mm2: None,
            next_status: current_status,
        };
    };

    let remaining = (prior - consumed.max(0.0)).max(0.0);
    let next_status = if remaining <= 0.0 {
        OffcutStatus::Used
    } else if remaining < discard_ratio * prior {
        OffcutStatus::Discarded
    } else {
        current_status
    };

    PartialUsageOutcome {
        remaining_area_mm2: Some(remaining),
        next_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::offcut::OffcutShape;
    use crate::domain::types::OffcutCondition;
    use chrono::Utc;

    fn offcut_with_status(status: OffcutStatus) -> Offcut {
        Offcut {
            offcut_id: "OC".to_string(),
            material_id: "M".to_string(),
            thickness_mm: 3.0,
            shape: OffcutShape::Rectangle {
                width_mm: 10.0,
                height_mm: 100.0,
            },
            estimated_area_mm2: Some(1000.0),
            quantity: 1,
            location_label: None,
            condition: OffcutCondition::Good,
            status,
            source: None,
            notes: None,
            created_by_user_id: None,
            deleted_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_reserve_only_from_available() {
        assert!(ensure_transition_allowed(
            &offcut_with_status(OffcutStatus::Available),
            LifecycleOperation::Reserve
        )
        .is_ok());
        for status in [OffcutStatus::Reserved, OffcutStatus::Used, OffcutStatus::Discarded] {
            let err = ensure_transition_allowed(&offcut_with_status(status), LifecycleOperation::Reserve)
                .unwrap_err();
            assert_eq!(err.status, status);
        }
    }

    #[test]
    fn test_use_rejected_on_terminal() {
        for op in [LifecycleOperation::UseFull, LifecycleOperation::UsePartial] {
            assert!(ensure_transition_allowed(&offcut_with_status(OffcutStatus::Reserved), op).is_ok());
            assert!(ensure_transition_allowed(&offcut_with_status(OffcutStatus::Used), op).is_err());
            assert!(ensure_transition_allowed(&offcut_with_status(OffcutStatus::Discarded), op).is_err());
        }
    }

    #[test]
    fn test_partial_950_of_1000_discards() {
        let outcome = derive_partial_usage(Some(1000.0), Some(950.0), OffcutStatus::Available, 0.15);
        assert_eq!(outcome.remaining_area_mm2, Some(50.0));
        assert_eq!(outcome.next_status, OffcutStatus::Discarded);
    }

    #[test]
    fn test_partial_full_consumption_marks_used() {
        let outcome = derive_partial_usage(Some(1000.0), Some(1000.0), OffcutStatus::Available, 0.15);
        assert_eq!(outcome.remaining_area_mm2, Some(0.0));
        assert_eq!(outcome.next_status, OffcutStatus::Used);

        let over = derive_partial_usage(Some(1000.0), Some(5000.0), OffcutStatus::Reserved, 0.15);
        assert_eq!(over.remaining_area_mm2, Some(0.0));
        assert_eq!(over.next_status, OffcutStatus::Used);
    }

    #[test]
    fn test_partial_keeps_status_at_threshold() {
        let outcome = derive_partial_usage(Some(1000.0), Some(850.0), OffcutStatus::Reserved, 0.15);
        assert_eq!(outcome.remaining_area_mm2, Some(150.0));
        assert_eq!(outcome.next_status, OffcutStatus::Reserved);
    }

    #[test]
    fn test_partial_unknown_area_changes_nothing() {
        let outcome = derive_partial_usage(None, Some(10.0), OffcutStatus::Available, 0.15);
        assert_eq!(outcome.remaining_area_mm2, None);
        assert_eq!(outcome.next_status, OffcutStatus::Available);

        let outcome = derive_partial_usage(Some(1000.0), None, OffcutStatus::Available, 0.15);
        assert_eq!(outcome.remaining_area_mm2, None);
    }
}
