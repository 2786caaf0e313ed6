//! 残留加密货币秘密的自适应扫描流水线（核心库）
//!
//! 设计要点：
//! - 校验器（Base58Check/Bech32/WIF/助记词）是纯函数，解码失败只表现
//!   为"不是有效地址"，从不向上抛致命错误。
//! - 内容扫描把外部行搜索工具（rg，退路 grep）当可插拔协作者：按
//!   chunk 派发、限并发、限超时，chunk 级失败保留部分结果继续跑。
//! - 升级引擎在阶段间对策略规则求值，动态改参数、追加阶段；阶段集合
//!   单调增长，直到没有待跑阶段为止。
//! - 只有策略描述本身非法是致命错误；长时间扫描里部分结果永远优于
//!   中途放弃。

mod base58;
mod bech32;
mod content_scan;
mod enumerate;
mod escalate;
mod exec;
mod expr;
mod mnemonic;
mod output;
mod params;
mod pattern_rules;
mod pipeline;
mod policy;
mod score;
mod types;

pub use base58::{decode_base58_check, is_valid_legacy_address, is_valid_wif, DecodeError};
pub use bech32::{verify_bech32, DEFAULT_HRPS};
pub use content_scan::{SearchTool, SEARCH_PATTERN, SNIPPET_MAX_BYTES};
pub use enumerate::enumerate_files;
pub use escalate::EscalationEngine;
pub use expr::{Condition, PolicyError};
pub use mnemonic::MnemonicDetector;
pub use output::{run_output_dir, write_run};
pub use params::ScanParams;
pub use pipeline::Pipeline;
pub use policy::{ConfigError, Policy, StageId, DEFAULT_POLICY_TOML};
pub use score::{CandidateScorer, ScoreWeights};
pub use types::{FileRecord, Hit, MnemonicCandidate, RuleMatch, RunOutput, RunStats};
