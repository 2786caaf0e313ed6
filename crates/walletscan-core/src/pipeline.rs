//! 流水线编排：阶段顺序执行，阶段间由升级引擎驱动参数与阶段变化
//!
//! 所有权模型：累计的命中/助记词/统计只有编排器这一个写者；阶段函数
//! 拿参数快照、返回增量。取消信号到达后不再进入新阶段，已有结果照常
//! 作为有效的部分产物返回。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{info, warn};

use crate::content_scan;
use crate::enumerate::enumerate_files;
use crate::escalate::EscalationEngine;
use crate::mnemonic::MnemonicDetector;
use crate::pattern_rules;
use crate::policy::{Policy, StageId};
use crate::score::CandidateScorer;
use crate::types::{FileRecord, Hit, MnemonicCandidate, RunOutput, RunStats};

pub struct Pipeline {
    policy: Policy,
    targets: Vec<PathBuf>,
    workdir: PathBuf,
    rules_path: Option<PathBuf>,
    force_stages: Vec<StageId>,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    pub fn new(policy: Policy, targets: Vec<PathBuf>) -> Self {
        Self {
            policy,
            targets,
            workdir: std::env::temp_dir(),
            rules_path: None,
            force_stages: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 外部规则文件与临时目录（缺省用系统临时目录）
    pub fn with_workdir(mut self, workdir: PathBuf) -> Self {
        self.workdir = workdir;
        self
    }

    pub fn with_rules_path(mut self, rules: Option<PathBuf>) -> Self {
        self.rules_path = rules;
        self
    }

    /// 从一开始就强制启用的阶段（如 CLI 的 --yara）
    pub fn with_forced_stages(mut self, stages: Vec<StageId>) -> Self {
        self.force_stages = stages;
        self
    }

    /// 共享取消句柄；置位后不再派发新阶段/新 chunk
    pub fn cancel_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// 跑完整个流水线并返回结构化产物
    pub fn run(&self) -> Result<RunOutput> {
        let started = Instant::now();
        let mut params = self.policy.params.clone();
        let mut active = self.policy.initial_stages.clone();
        for stage in &self.force_stages {
            if !active.contains(stage) {
                active.push(*stage);
            }
        }

        let engine = EscalationEngine::new(self.policy.rules.clone());
        let scorer = Arc::new(CandidateScorer::new(self.policy.weights));
        let detector = MnemonicDetector::new();

        let mut files: Vec<FileRecord> = Vec::new();
        let mut hits: Vec<Hit> = Vec::new();
        let mut mnemonics: Vec<MnemonicCandidate> = Vec::new();
        let mut rule_matches = Vec::new();
        let mut stats = RunStats::default();

        let mut idx = 0;
        while idx < active.len() {
            if self.cancel.load(Ordering::Relaxed) {
                info!("cancelled, returning partial results");
                break;
            }
            let stage = active[idx];
            let stage_start = Instant::now();
            match stage {
                StageId::Enumerate => {
                    for target in &self.targets {
                        if !target.exists() {
                            warn!(path = %target.display(), "target does not exist, skipping");
                            continue;
                        }
                        files.extend(enumerate_files(target, &params));
                    }
                    info!(files = files.len(), "enumeration done");
                }
                StageId::ContentScan => {
                    let outcome = content_scan::scan(&files, &params, &scorer, &self.cancel);
                    info!(
                        hits = outcome.hits.len(),
                        chunks = outcome.chunks_total,
                        failures = outcome.chunk_failures,
                        "content scan done"
                    );
                    hits.extend(outcome.hits);
                }
                StageId::PatternRules => {
                    let outcome = pattern_rules::scan(
                        &files,
                        &params,
                        self.rules_path.as_deref(),
                        &self.workdir,
                        &self.cancel,
                    );
                    if !outcome.skipped {
                        info!(
                            matches = outcome.matches.len(),
                            failures = outcome.file_failures,
                            "pattern rule scan done"
                        );
                    }
                    rule_matches.extend(outcome.matches);
                }
                StageId::MnemonicExtract => {
                    let extracted = extract_mnemonics(&detector, &hits);
                    info!(candidates = extracted.len(), "mnemonic extraction done");
                    mnemonics.extend(extracted);
                }
            }
            info!(stage = ?stage, took_s = stage_start.elapsed().as_secs_f64(), "stage complete");

            // 阶段间转移：重算统计、同步求值全部规则
            stats = RunStats::compute(files.len() as u64, &hits, started.elapsed().as_secs_f64());
            let escalation = engine.evaluate(&stats, &mut params, &mut active);
            if !escalation.stages_added.is_empty() {
                info!(added = ?escalation.stages_added, "escalation enabled stages");
            }
            idx += 1;
        }

        stats = RunStats::compute(files.len() as u64, &hits, started.elapsed().as_secs_f64());
        Ok(RunOutput { hits, mnemonics, rule_matches, summary: stats })
    }
}

/// 从命中片段里提取助记词候选；候选永远挂在来源 Hit 的文件与行号上
fn extract_mnemonics(detector: &MnemonicDetector, hits: &[Hit]) -> Vec<MnemonicCandidate> {
    hits.iter()
        .filter_map(|hit| {
            detector.detect(&hit.snippet).map(|phrase| MnemonicCandidate {
                file: hit.file.clone(),
                line: hit.line,
                phrase,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::Policy;

    fn hit(snippet: &str) -> Hit {
        Hit { file: "/x".into(), line: 3, score: 6, reasons: vec![], snippet: snippet.into() }
    }

    #[test]
    fn mnemonic_extraction_keeps_hit_provenance() {
        let det = MnemonicDetector::new();
        let phrase =
            "legal winner thank year wave sausage worth useful legal winner thank yellow";
        let out = extract_mnemonics(&det, &[hit("no phrase"), hit(phrase)]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].file, "/x");
        assert_eq!(out[0].line, 3);
        assert_eq!(out[0].phrase, phrase);
    }

    #[test]
    fn cancelled_pipeline_returns_partial_output() {
        let pipeline = Pipeline::new(Policy::builtin(), vec![]);
        pipeline.cancel_token().store(true, Ordering::Relaxed);
        let out = pipeline.run().unwrap();
        assert!(out.hits.is_empty());
        assert_eq!(out.summary.files, 0);
    }

    #[test]
    fn forced_stages_are_active_from_start() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = Pipeline::new(Policy::builtin(), vec![dir.path().to_path_buf()])
            .with_forced_stages(vec![StageId::MnemonicExtract]);
        let out = pipeline.run().unwrap();
        // 空目录：没有命中自然也没有助记词，但阶段本身执行过且不报错
        assert!(out.mnemonics.is_empty());
    }
}
