//! 内容扫描阶段：分块驱动外部行搜索工具，解析输出并打分
//!
//! 并行结构沿用 worker→collector 模型：独立线程里建 Rayon 线程池跑
//! 各 chunk，结果经 crossbeam 通道送回当前线程聚合。chunk 级失败
//! （超时、异常退出码、工具缺失）只计数、不中断阶段；命中顺序是
//! 完成顺序，不提供跨 chunk 的顺序保证。

use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::exec::{run_with_timeout, tool_in_path};
use crate::params::ScanParams;
use crate::score::CandidateScorer;
use crate::types::{FileRecord, Hit};

/// 覆盖钱包文件标记、派生标记、扩展公钥前缀与各类地址/私钥形态的
/// 单一合取模式，一次编译后传给外部工具
pub const SEARCH_PATTERN: &str = r"wallet\.dat|electrum|metamask|keystore|bip(39|32)|mnemonic|seed( phrase)?|xpub|ypub|zpub|tpub|xprv|bc1[ac-hj-np-z02-9]{25,87}|tb1[ac-hj-np-z02-9]{25,87}|(^|[^A-Za-z0-9])[13][1-9A-HJ-NP-Za-km-z]{25,34}([^A-Za-z0-9]|$)|0x[a-fA-F0-9]{64}|(5[HJK][1-9A-HJ-NP-Za-km-z]{49,51})|(K|L)[1-9A-HJ-NP-Za-km-z]{51,52}";

/// 片段截断上限（字节），限制内存与输出体积
pub const SNIPPET_MAX_BYTES: usize = 400;

/// 可用的外部行搜索工具
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchTool {
    /// 多线程正则搜索（优先）
    Ripgrep,
    /// 单模式 grep 退路
    Grep,
}

impl SearchTool {
    /// 依据参数与 PATH 现状选择工具；两者都缺时返回 None
    pub fn select(prefer_rg: bool) -> Option<Self> {
        if prefer_rg && tool_in_path("rg") {
            return Some(SearchTool::Ripgrep);
        }
        if tool_in_path("grep") {
            return Some(SearchTool::Grep);
        }
        if tool_in_path("rg") {
            return Some(SearchTool::Ripgrep);
        }
        None
    }

    fn command(&self, paths: &[PathBuf], proc_threads: usize) -> Command {
        match self {
            SearchTool::Ripgrep => {
                let mut cmd = Command::new("rg");
                cmd.args(["-a", "-n", "-H", "--no-heading", "--no-messages"])
                    .arg("-j")
                    .arg(proc_threads.max(1).to_string())
                    .arg("-e")
                    .arg(SEARCH_PATTERN)
                    .arg("--");
                cmd.args(paths);
                cmd
            }
            SearchTool::Grep => {
                let mut cmd = Command::new("grep");
                cmd.args(["-a", "-H", "-n", "-E", SEARCH_PATTERN, "--"]);
                cmd.args(paths);
                cmd
            }
        }
    }
}

/// 阶段产出：命中与 chunk 级诊断计数
#[derive(Debug, Default)]
pub struct ContentScanOutcome {
    pub hits: Vec<Hit>,
    pub chunks_total: usize,
    pub chunk_failures: usize,
}

/// 扫描整个文件清单
pub fn scan(
    files: &[FileRecord],
    params: &ScanParams,
    scorer: &Arc<CandidateScorer>,
    cancel: &Arc<AtomicBool>,
) -> ContentScanOutcome {
    let mut outcome = ContentScanOutcome::default();
    if files.is_empty() {
        return outcome;
    }

    let Some(tool) = SearchTool::select(params.prefer_rg) else {
        warn!("no external search tool (rg/grep) in PATH, content scan skipped");
        outcome.chunks_total = files.len().div_ceil(params.chunk_size.max(1));
        outcome.chunk_failures = outcome.chunks_total;
        return outcome;
    };

    let chunk_size = params.chunk_size.max(1);
    let chunks: Vec<Vec<PathBuf>> = files
        .chunks(chunk_size)
        .map(|c| c.iter().map(|f| f.path.clone()).collect())
        .collect();
    outcome.chunks_total = chunks.len();

    let threads = params.effective_threads();
    let proc_threads = (threads / 2).max(1);
    let timeout = Duration::from_secs(params.chunk_timeout_s);

    type Msg = (usize, Vec<Hit>, bool); // (chunk 序号, 命中, 是否失败)
    let (tx, rx) = crossbeam_channel::bounded::<Msg>(64);

    let scorer = Arc::clone(scorer);
    let cancel_flag = Arc::clone(cancel);
    let scan_thread = std::thread::spawn(move || {
        use rayon::prelude::*;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .expect("build rayon pool");
        pool.install(|| {
            chunks.par_iter().enumerate().for_each(|(idx, paths)| {
                // 取消后不再派发新 chunk；在途的由超时边界自行收敛
                if cancel_flag.load(Ordering::Relaxed) {
                    let _ = tx.send((idx, Vec::new(), false));
                    return;
                }
                let (hits, failed) = scan_chunk(tool, paths, proc_threads, timeout, &scorer);
                let _ = tx.send((idx, hits, failed));
            });
        });
        // 线程结束时所有 Sender 释放，collector 的 recv 循环随之退出
    });

    while let Ok((idx, hits, failed)) = rx.recv() {
        if failed {
            outcome.chunk_failures += 1;
            warn!(chunk = idx, "content scan chunk failed, keeping partial results");
        } else {
            debug!(chunk = idx, hits = hits.len(), "chunk done");
        }
        outcome.hits.extend(hits);
    }
    let _ = scan_thread.join();
    outcome
}

/// 扫描单个 chunk：调用外部工具、解析 `path:line:snippet`、打分过滤
fn scan_chunk(
    tool: SearchTool,
    paths: &[PathBuf],
    proc_threads: usize,
    timeout: Duration,
    scorer: &CandidateScorer,
) -> (Vec<Hit>, bool) {
    let output = match run_with_timeout(tool.command(paths, proc_threads), timeout) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "failed to spawn search tool");
            return (Vec::new(), true);
        }
    };
    // 超时/异常退出码也要吃掉已产出的部分 stdout，再计为失败
    let hits = parse_tool_output(&output.stdout, scorer);
    (hits, !output.ran_ok())
}

/// 解析工具输出；只在前两个冒号处切分，片段本身可以含冒号
pub(crate) fn parse_tool_output(stdout: &str, scorer: &CandidateScorer) -> Vec<Hit> {
    let mut hits = Vec::new();
    for line in stdout.lines() {
        let mut parts = line.splitn(3, ':');
        let (Some(file), Some(line_no), Some(snippet)) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let Ok(line_no) = line_no.parse::<u64>() else { continue };
        let (score, reasons) = scorer.score_line(snippet);
        if score > 0 {
            hits.push(Hit {
                file: file.to_string(),
                line: line_no,
                score,
                reasons,
                snippet: truncate_snippet(snippet),
            });
        }
    }
    hits
}

/// 按字节上限截断，回退到最近的字符边界
fn truncate_snippet(snippet: &str) -> String {
    if snippet.len() <= SNIPPET_MAX_BYTES {
        return snippet.to_string();
    }
    let mut end = SNIPPET_MAX_BYTES;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }
    snippet[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::ScoreWeights;
    use std::fs;

    const BECH32_ADDR: &str = "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4";

    fn scorer() -> CandidateScorer {
        CandidateScorer::new(ScoreWeights::default())
    }

    #[test]
    fn parses_path_line_snippet_with_colons_in_snippet() {
        let out = format!("/tmp/a.txt:7:address: {BECH32_ADDR} end\n");
        let hits = parse_tool_output(&out, &scorer());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "/tmp/a.txt");
        assert_eq!(hits[0].line, 7);
        assert!(hits[0].snippet.contains("address:"));
        assert_eq!(hits[0].score, 4);
    }

    #[test]
    fn zero_score_lines_are_dropped() {
        let out = "/tmp/a.txt:1:plain keystore mention without any key\n";
        assert!(parse_tool_output(out, &scorer()).is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let out = format!("garbage\n/tmp/a.txt:notanumber:{BECH32_ADDR}\n");
        assert!(parse_tool_output(&out, &scorer()).is_empty());
    }

    #[test]
    fn snippet_is_truncated_on_char_boundary() {
        let long = format!("{BECH32_ADDR} {}", "分".repeat(300));
        let out = format!("/tmp/a.txt:1:{long}\n");
        let hits = parse_tool_output(&out, &scorer());
        assert!(hits[0].snippet.len() <= SNIPPET_MAX_BYTES);
        assert!(hits[0].snippet.is_char_boundary(hits[0].snippet.len()));
    }

    #[test]
    fn scan_finds_planted_address_via_external_tool() {
        // 依赖系统内的 grep/rg；两者都缺时本用例无法有意义地运行
        if SearchTool::select(false).is_none() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dump.txt");
        fs::write(&target, format!("noise line\nhot {BECH32_ADDR} here\n")).unwrap();
        let files = vec![FileRecord { path: target.clone(), size_bytes: 64 }];

        let params = ScanParams { prefer_rg: false, threads: 2, ..Default::default() };
        let outcome = scan(
            &files,
            &params,
            &Arc::new(scorer()),
            &Arc::new(AtomicBool::new(false)),
        );
        assert_eq!(outcome.chunk_failures, 0);
        assert_eq!(outcome.hits.len(), 1);
        assert_eq!(outcome.hits[0].line, 2);
        assert_eq!(outcome.hits[0].file, target.to_string_lossy());
    }

    #[test]
    fn cancelled_scan_dispatches_nothing() {
        if SearchTool::select(true).is_none() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("dump.txt");
        fs::write(&target, BECH32_ADDR).unwrap();
        let files = vec![FileRecord { path: target, size_bytes: 42 }];

        let cancel = Arc::new(AtomicBool::new(true));
        let outcome = scan(&files, &ScanParams::default(), &Arc::new(scorer()), &cancel);
        assert!(outcome.hits.is_empty());
        assert_eq!(outcome.chunk_failures, 0);
    }
}
