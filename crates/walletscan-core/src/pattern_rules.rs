//! 模式规则阶段：按可用性调用外部 yara，对枚举文件跑一小组内置规则
//!
//! 工具缺席不是错误，阶段整体跳过；单文件失败同样只计数。

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{info, warn};

use crate::exec::{run_with_timeout, tool_in_path};
use crate::params::ScanParams;
use crate::types::{FileRecord, RuleMatch};

/// 内置最小规则集：ETH keystore JSON 与 Electrum 钱包的标记词
pub const BUILTIN_RULES: &str = concat!(
    "rule ETH_Keystore { strings: $a=\"crypto\" $b=\"kdf\" $c=\"ciphertext\" $d=\"mac\" ",
    "condition: all of them }\n",
    "rule Electrum { strings: $a=\"seed_version\" $b=\"wallet_type\" $c=\"keystore\" ",
    "condition: 2 of ($a,$b,$c) }\n",
);

/// 阶段产出
#[derive(Debug, Default)]
pub struct PatternRuleOutcome {
    pub matches: Vec<RuleMatch>,
    pub file_failures: usize,
    /// 工具不可用时为 true（阶段被跳过）
    pub skipped: bool,
}

/// 对文件清单运行规则扫描；`rules_path` 为空时把内置规则落到 workdir
pub fn scan(
    files: &[FileRecord],
    params: &ScanParams,
    rules_path: Option<&Path>,
    workdir: &Path,
    cancel: &Arc<AtomicBool>,
) -> PatternRuleOutcome {
    let mut outcome = PatternRuleOutcome::default();
    if files.is_empty() {
        return outcome;
    }
    if !tool_in_path("yara") {
        info!("yara not in PATH, pattern rule stage skipped");
        outcome.skipped = true;
        return outcome;
    }

    let rules: PathBuf = match rules_path {
        Some(p) if p.exists() => p.to_path_buf(),
        _ => {
            let staged = workdir.join("walletscan_builtin.yar");
            if let Err(e) = std::fs::write(&staged, BUILTIN_RULES) {
                warn!(error = %e, "cannot stage builtin rules, pattern stage skipped");
                outcome.skipped = true;
                return outcome;
            }
            staged
        }
    };

    let timeout = Duration::from_secs(params.chunk_timeout_s);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(params.effective_threads())
        .build()
        .expect("build rayon pool");

    type Msg = (Vec<RuleMatch>, bool);
    let (tx, rx) = crossbeam_channel::unbounded::<Msg>();

    pool.install(|| {
        use rayon::prelude::*;
        files.par_iter().for_each(|record| {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let _ = tx.send(scan_one(&rules, &record.path, timeout));
        });
    });
    drop(tx);

    while let Ok((matches, failed)) = rx.recv() {
        if failed {
            outcome.file_failures += 1;
        }
        outcome.matches.extend(matches);
    }
    outcome
}

/// 单文件调用：`yara -s <rules> <file>`，每行输出即一条命中明细
fn scan_one(rules: &Path, file: &Path, timeout: Duration) -> (Vec<RuleMatch>, bool) {
    let mut cmd = Command::new("yara");
    cmd.arg("-s").arg(rules).arg(file);
    let output = match run_with_timeout(cmd, timeout) {
        Ok(out) => out,
        Err(_) => return (Vec::new(), true),
    };
    let matches = output
        .stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| RuleMatch { file: file.to_string_lossy().into_owned(), detail: l.to_string() })
        .collect();
    (matches, !output.ran_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_rules_cover_keystore_and_electrum() {
        assert!(BUILTIN_RULES.contains("ETH_Keystore"));
        assert!(BUILTIN_RULES.contains("Electrum"));
    }

    #[test]
    fn missing_tool_skips_stage() {
        // 大多数测试环境没有 yara；有的话本用例直接放行
        if tool_in_path("yara") {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let files = vec![FileRecord { path: dir.path().join("x"), size_bytes: 0 }];
        let outcome = scan(
            &files,
            &ScanParams::default(),
            None,
            dir.path(),
            &Arc::new(AtomicBool::new(false)),
        );
        assert!(outcome.skipped);
        assert!(outcome.matches.is_empty());
    }

    #[test]
    fn empty_file_list_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = scan(
            &[],
            &ScanParams::default(),
            None,
            dir.path(),
            &Arc::new(AtomicBool::new(false)),
        );
        assert!(!outcome.skipped);
        assert!(outcome.matches.is_empty());
    }
}
