//! 产物落盘：hits / mnemonics / rule_matches / summary 四个 JSON 文件
//!
//! 字段名与下游报表查看器约定一致，不要改名。

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::types::RunOutput;

/// 本次运行的输出目录：`<root>/_logs/walletscan_<epoch>`
pub fn run_output_dir(root: &Path) -> PathBuf {
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    root.join("_logs").join(format!("walletscan_{epoch}"))
}

/// 把一次运行的全部产物写入 `outdir`
pub fn write_run(outdir: &Path, output: &RunOutput) -> Result<()> {
    std::fs::create_dir_all(outdir)
        .with_context(|| format!("create output dir {}", outdir.display()))?;
    write_json(&outdir.join("hits.json"), &output.hits)?;
    write_json(&outdir.join("mnemonics.json"), &output.mnemonics)?;
    write_json(&outdir.join("rule_matches.json"), &output.rule_matches)?;
    write_json(&outdir.join("summary.json"), &output.summary)?;
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("serialize {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Hit, RunStats};

    #[test]
    fn writes_all_four_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let out = RunOutput {
            hits: vec![Hit {
                file: "/tmp/wallet.txt".into(),
                line: 2,
                score: 4,
                reasons: vec!["1 bech32".into()],
                snippet: "bc1q…".into(),
            }],
            mnemonics: vec![],
            rule_matches: vec![],
            summary: RunStats::compute(1, &[], 1.0),
        };
        let outdir = dir.path().join("run");
        write_run(&outdir, &out).unwrap();

        for name in ["hits.json", "mnemonics.json", "rule_matches.json", "summary.json"] {
            assert!(outdir.join(name).is_file(), "{name} missing");
        }
        let hits: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(outdir.join("hits.json")).unwrap())
                .unwrap();
        assert_eq!(hits[0]["file"], "/tmp/wallet.txt");
        assert_eq!(hits[0]["score"], 4);
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(outdir.join("summary.json")).unwrap())
                .unwrap();
        assert!(summary.get("hits_per_min").is_some());
    }
}
