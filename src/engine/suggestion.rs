// ==========================================
// 激光切割车间 - 余料推荐引擎
// ==========================================
// 单件: 需求推导 → 同大类同厚度候选 → 适配评分 → 按分数降序取前 N
// 批次: 按材料+厚度分组 → 组内最大需求面积 → 面积(含余量)过滤 → 按面积升序取前 N
// 说明: 推荐为只读快照, 不加锁; 正确性由后续 reserve/use 的事务保证
// ==========================================

use crate::config::offcut_policy::OffcutPolicy;
use crate::domain::offcut::Offcut;
use crate::engine::fit_scorer::{FitCandidate, FitReason, FitRequirement, FitScorer};
use crate::engine::requirement_resolver::{BatchRequirement, Requirement, RequirementResolver};
use crate::repository::catalog_repo::CatalogLookup;
use crate::repository::error::RepositoryResult;
use crate::repository::offcut_repo::OffcutRepository;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

// ==========================================
// 输出结构
// ==========================================

/// 单件推荐条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OffcutSuggestion {
    pub offcut: Offcut,
    pub fit_reason: FitReason,
    pub score: f64,
}

/// 批次分组推荐
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGroupSuggestion {
    pub material_id: String,
    pub thickness_mm: f64,
    pub required_area_mm2: f64,
    pub safety_margin: f64,
    pub order_item_ids: Vec<String>,
    pub candidates: Vec<Offcut>,
}

// ==========================================
// SuggestionEngine
// ==========================================
pub struct SuggestionEngine {
    offcut_repo: Arc<OffcutRepository>,
    resolver: RequirementResolver,
    scorer: FitScorer,
    policy: OffcutPolicy,
}

impl SuggestionEngine {
    pub fn new(
        offcut_repo: Arc<OffcutRepository>,
        catalog: Arc<dyn CatalogLookup>,
        policy: OffcutPolicy,
    ) -> Self {
        Self {
            offcut_repo,
            resolver: RequirementResolver::new(catalog, policy.clone()),
            scorer: FitScorer::new(),
            policy,
        }
    }

    /// 单个订单行的余料推荐
    ///
    /// 需求无法推导时返回空列表; 订单行不存在返回 NotFound
    pub fn suggest_for_order_item(
        &self,
        order_item_id: &str,
    ) -> RepositoryResult<Vec<OffcutSuggestion>> {
        let Some(requirement) = self.resolver.resolve_order_item(order_item_id)? else {
            return Ok(Vec::new());
        };
        self.suggest_for_requirement(&requirement)
    }

    /// 按已推导的需求推荐
    pub fn suggest_for_requirement(
        &self,
        requirement: &Requirement,
    ) -> RepositoryResult<Vec<OffcutSuggestion>> {
        let candidates = self.offcut_repo.list_candidates_by_category(
            requirement.material_category.to_db_str(),
            requirement.thickness_mm,
        )?;
        debug!(
            material_id = %requirement.material_id,
            category = %requirement.material_category,
            thickness_mm = requirement.thickness_mm,
            candidate_count = candidates.len(),
            "单件推荐候选已加载"
        );

        Ok(rank_candidates(
            &self.scorer,
            requirement,
            candidates,
            self.policy.suggestion_limit,
        ))
    }

    /// 批次的分组余料推荐 (无合格候选的分组省略)
    pub fn suggest_for_batch(&self, batch_id: &str) -> RepositoryResult<Vec<BatchGroupSuggestion>> {
        let groups = self.resolver.resolve_batch(batch_id)?;
        let mut result = Vec::with_capacity(groups.len());

        for group in groups {
            let Some(required_area) = group.required_area_mm2 else {
                debug!(batch_id, material_id = %group.material_id, "分组无可推导面积，跳过");
                continue;
            };

            let candidates = self
                .offcut_repo
                .list_candidates_by_material(&group.material_id, group.thickness_mm)?;
            let selected = select_batch_candidates(
                required_area,
                group.safety_margin,
                candidates,
                self.policy.suggestion_limit,
            );
            if selected.is_empty() {
                continue;
            }

            result.push(into_group_suggestion(group, required_area, selected));
        }

        Ok(result)
    }
}

fn into_group_suggestion(
    group: BatchRequirement,
    required_area_mm2: f64,
    candidates: Vec<Offcut>,
) -> BatchGroupSuggestion {
    BatchGroupSuggestion {
        material_id: group.material_id,
        thickness_mm: group.thickness_mm,
        required_area_mm2,
        safety_margin: group.safety_margin,
        order_item_ids: group.order_item_ids,
        candidates,
    }
}

/// 评分、剔除不匹配、按分数降序截取
pub fn rank_candidates(
    scorer: &FitScorer,
    requirement: &Requirement,
    candidates: Vec<Offcut>,
    limit: usize,
) -> Vec<OffcutSuggestion> {
    let fit_req = FitRequirement::from(requirement);

    let mut ranked: Vec<OffcutSuggestion> = candidates
        .into_iter()
        .filter_map(|offcut| {
            let result = scorer.score(&fit_req, &FitCandidate::from(&offcut))?;
            Some(OffcutSuggestion {
                offcut,
                fit_reason: result.fit_reason,
                score: result.score,
            })
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.offcut.offcut_id.cmp(&b.offcut.offcut_id))
    });
    ranked.truncate(limit);
    ranked
}

/// 批次候选: 面积 ≥ 需求×(1+余量), 按面积升序截取
pub fn select_batch_candidates(
    required_area_mm2: f64,
    safety_margin: f64,
    candidates: Vec<Offcut>,
    limit: usize,
) -> Vec<Offcut> {
    let threshold = required_area_mm2 * (1.0 + safety_margin);

    let mut selected: Vec<(f64, Offcut)> = candidates
        .into_iter()
        .filter_map(|offcut| {
            let area = offcut.effective_area()?;
            (area >= threshold).then_some((area, offcut))
        })
        .collect();

    selected.sort_by(|a, b| match a.0.total_cmp(&b.0) {
        Ordering::Equal => a.1.offcut_id.cmp(&b.1.offcut_id),
        other => other,
    });
    selected.truncate(limit);
    selected.into_iter().map(|(_, offcut)| offcut).collect()
}
