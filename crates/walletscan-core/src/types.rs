//! 公共记录类型（对外暴露、可序列化）

use std::path::PathBuf;

use serde::Serialize;

/// 枚举阶段产出的文件记录
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size_bytes: u64,
}

/// 一条命中：文件、1 起始行号、加权分值、原因标签、截断后的片段
#[derive(Debug, Clone, Serialize)]
pub struct Hit {
    pub file: String,
    pub line: u64,
    pub score: u32,
    pub reasons: Vec<String>,
    pub snippet: String,
}

/// 从命中片段还原出的助记词候选（永远派生自 Hit）
#[derive(Debug, Clone, Serialize)]
pub struct MnemonicCandidate {
    pub file: String,
    pub line: u64,
    pub phrase: String,
}

/// 模式规则阶段（外部 yara 工具）的命中
#[derive(Debug, Clone, Serialize)]
pub struct RuleMatch {
    pub file: String,
    pub detail: String,
}

/// 聚合统计：每个阶段结束后基于累计结果重算，升级引擎只读
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RunStats {
    pub files: u64,
    pub hits: u64,
    pub elapsed_s: f64,
    pub hits_per_min: f64,
    pub avg_score: f64,
}

impl RunStats {
    /// 升级规则表达式可见的变量绑定（白名单即这里列出的字段名）
    pub fn lookup(&self, name: &str) -> Option<f64> {
        match name {
            "files" => Some(self.files as f64),
            "hits" => Some(self.hits as f64),
            "elapsed_s" => Some(self.elapsed_s),
            "hits_per_min" => Some(self.hits_per_min),
            "avg_score" => Some(self.avg_score),
            _ => None,
        }
    }

    pub(crate) fn compute(files: u64, hits: &[Hit], elapsed_s: f64) -> Self {
        let elapsed_s = elapsed_s.max(1e-6);
        let total: u64 = hits.iter().map(|h| h.score as u64).sum();
        Self {
            files,
            hits: hits.len() as u64,
            elapsed_s: round2(elapsed_s),
            hits_per_min: round2(hits.len() as f64 / elapsed_s * 60.0),
            avg_score: round2(total as f64 / hits.len().max(1) as f64),
        }
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// 一次完整运行的产物：命中、助记词、规则命中与汇总
#[derive(Debug, Clone, Serialize)]
pub struct RunOutput {
    pub hits: Vec<Hit>,
    pub mnemonics: Vec<MnemonicCandidate>,
    pub rule_matches: Vec<RuleMatch>,
    pub summary: RunStats,
}
