//! 策略描述（TOML）：初始参数、初始阶段与升级规则
//!
//! 错误分级：策略文件缺失/结构非法是唯一的致命错误（流水线开跑前
//! 中止）；单条规则的条件表达式非法只让该条规则永远不命中。

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::expr::Condition;
use crate::params::ScanParams;
use crate::score::ScoreWeights;

/// 内置回退策略（与 `policies/default.toml` 同文）
pub const DEFAULT_POLICY_TOML: &str = include_str!("../../../policies/default.toml");

/// 策略层面的致命错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read policy file: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed policy: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid policy: {0}")]
    Invalid(String),
}

/// 流水线阶段标识（带标签的变体；别名兼容旧策略里的 yara/mnemonic）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    Enumerate,
    ContentScan,
    #[serde(alias = "yara")]
    PatternRules,
    #[serde(alias = "mnemonic")]
    MnemonicExtract,
}

/// 一条升级规则：条件 + 参数覆盖 + 追加阶段
#[derive(Debug, Clone)]
pub struct EscalationRule {
    /// 原始条件文本（诊断用）
    pub when: String,
    /// 预编译的条件；None 表示解析失败，规则永不命中
    pub condition: Option<Condition>,
    pub param_updates: BTreeMap<String, toml::Value>,
    pub add_stages: Vec<StageId>,
}

/// 解析并校验后的策略
#[derive(Debug, Clone)]
pub struct Policy {
    pub params: ScanParams,
    pub initial_stages: Vec<StageId>,
    pub weights: ScoreWeights,
    pub rules: Vec<EscalationRule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    initial: InitialSection,
    #[serde(default)]
    weights: ScoreWeights,
    #[serde(default, rename = "escalation")]
    escalation: Vec<RuleSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct InitialSection {
    #[serde(default)]
    params: ScanParams,
    #[serde(default)]
    stages: Vec<StageId>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSection {
    when: String,
    #[serde(default)]
    params: BTreeMap<String, toml::Value>,
    #[serde(default)]
    add_stages: Vec<StageId>,
}

impl Policy {
    /// 从 TOML 文本解析；结构性错误在这里就失败
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: PolicyFile = toml::from_str(text)?;

        let mut initial_stages = file.initial.stages;
        if initial_stages.is_empty() {
            initial_stages = vec![StageId::Enumerate, StageId::ContentScan];
        }
        if initial_stages[0] != StageId::Enumerate {
            return Err(ConfigError::Invalid(
                "first initial stage must be `enumerate`".into(),
            ));
        }
        if file.initial.params.chunk_size == 0 {
            return Err(ConfigError::Invalid("chunk_size must be >= 1".into()));
        }

        let rules = file
            .escalation
            .into_iter()
            .map(|r| {
                // 条件预编译失败不是致命错误：fail closed
                let condition = match Condition::parse(&r.when) {
                    Ok(c) => Some(c),
                    Err(e) => {
                        warn!(when = %r.when, error = %e, "escalation condition rejected, rule disabled");
                        None
                    }
                };
                EscalationRule {
                    when: r.when,
                    condition,
                    param_updates: r.params,
                    add_stages: r.add_stages,
                }
            })
            .collect();

        Ok(Self {
            params: file.initial.params,
            initial_stages,
            weights: file.weights,
            rules,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// 内置回退策略（原始启发式的默认档）
    pub fn builtin() -> Self {
        Self::from_toml(DEFAULT_POLICY_TOML).expect("builtin policy parses")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_policy_parses_and_matches_baseline() {
        let policy = Policy::builtin();
        assert_eq!(
            policy.initial_stages,
            vec![StageId::Enumerate, StageId::ContentScan]
        );
        assert_eq!(policy.rules.len(), 2);
        assert!(policy.rules.iter().all(|r| r.condition.is_some()));
        assert_eq!(policy.params.max_mb, 256);
    }

    #[test]
    fn stage_aliases_are_accepted() {
        let policy = Policy::from_toml(
            r#"
            [initial]
            stages = ["enumerate", "content_scan"]

            [[escalation]]
            when = "hits > 0"
            add_stages = ["yara", "mnemonic"]
            "#,
        )
        .unwrap();
        assert_eq!(
            policy.rules[0].add_stages,
            vec![StageId::PatternRules, StageId::MnemonicExtract]
        );
    }

    #[test]
    fn malformed_policy_is_fatal() {
        assert!(Policy::from_toml("this is not toml [").is_err());
        assert!(Policy::from_toml("[initial]\nstages = [\"no_such_stage\"]").is_err());
        // 未知顶层键也按结构错误处理
        assert!(Policy::from_toml("[initial]\n[surprise]\nx = 1").is_err());
    }

    #[test]
    fn first_stage_must_be_enumerate() {
        let err = Policy::from_toml("[initial]\nstages = [\"content_scan\"]").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn bad_rule_condition_fails_closed_not_fatal() {
        let policy = Policy::from_toml(
            r#"
            [initial]

            [[escalation]]
            when = "__import__('os').system('x')"
            add_stages = ["yara"]
            "#,
        )
        .unwrap();
        assert!(policy.rules[0].condition.is_none());
    }

    #[test]
    fn weights_section_overrides_defaults() {
        let policy = Policy::from_toml("[initial]\n[weights]\nbech32 = 9").unwrap();
        assert_eq!(policy.weights.bech32, 9);
        assert_eq!(policy.weights.legacy, 3);
    }
}
