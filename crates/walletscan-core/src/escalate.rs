//! 升级引擎：阶段间同步求值策略规则，改参数、加阶段
//!
//! 语义约定：
//! - 每次转移都对**全部**规则求值，不做首配短路；后命中的规则可以
//!   覆盖先命中规则写过的同名参数。
//! - 阶段集合单调增长：已激活的阶段不会重复加入，也永不移除。
//! - 条件求值出错（含编译期被禁用的规则）按不命中处理。

use tracing::{debug, warn};

use crate::params::ScanParams;
use crate::policy::{EscalationRule, StageId};
use crate::types::RunStats;

pub struct EscalationEngine {
    rules: Vec<EscalationRule>,
}

/// 一次求值的效果（诊断用）
#[derive(Debug, Default)]
pub struct EscalationOutcome {
    pub rules_matched: usize,
    pub stages_added: Vec<StageId>,
}

impl EscalationEngine {
    pub fn new(rules: Vec<EscalationRule>) -> Self {
        Self { rules }
    }

    /// 在一个阶段完成后调用；`active` 是当前的有序阶段列表
    pub fn evaluate(
        &self,
        stats: &RunStats,
        params: &mut ScanParams,
        active: &mut Vec<StageId>,
    ) -> EscalationOutcome {
        let mut outcome = EscalationOutcome::default();
        for rule in &self.rules {
            let matched = match &rule.condition {
                Some(cond) => match cond.eval(stats) {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(when = %rule.when, error = %e, "condition failed closed");
                        false
                    }
                },
                None => false,
            };
            if !matched {
                continue;
            }
            outcome.rules_matched += 1;
            debug!(when = %rule.when, "escalation rule matched");

            for (key, value) in &rule.param_updates {
                params.apply_update(key, value);
            }
            for stage in &rule.add_stages {
                if !active.contains(stage) {
                    active.push(*stage);
                    outcome.stages_added.push(*stage);
                }
            }
        }
        outcome
    }
}
