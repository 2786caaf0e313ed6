//! 文件枚举：遍历目标树并应用大小/排除/剪枝过滤
//!
//! 容错策略：单个不可读条目（权限、悬空符号链接）只是被跳过，
//! 绝不让整棵树的枚举失败。输出顺序即遍历顺序，不排序。

use std::path::Path;

use regex::RegexBuilder;
use tracing::warn;
use walkdir::WalkDir;

use crate::params::ScanParams;
use crate::types::FileRecord;

/// 枚举 `root` 下的候选文件
pub fn enumerate_files(root: &Path, params: &ScanParams) -> Vec<FileRecord> {
    let size_limit = params.size_limit_bytes();

    // 排除正则大小写不敏感；编译失败视为配置噪声，告警后当作无排除
    let exclude = params.exclude.as_deref().filter(|s| !s.is_empty()).and_then(|pat| {
        match RegexBuilder::new(pat).case_insensitive(true).build() {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(pattern = pat, error = %e, "invalid exclude pattern, ignoring");
                None
            }
        }
    });

    let prune = &params.prune_dirs;
    let mut out = Vec::new();

    // filter_entry 在进入子目录之前剔除剪枝目录，避免白走子树
    let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return true;
        }
        match entry.file_name().to_str() {
            Some(name) => !prune.iter().any(|p| p == name),
            None => true,
        }
    });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if !entry.file_type().is_file() {
            continue;
        }
        // metadata 读不到（权限/悬空链接）→ 跳过该文件
        let size = match entry.metadata() {
            Ok(md) => md.len(),
            Err(_) => continue,
        };
        if size > size_limit {
            continue;
        }
        if let Some(re) = &exclude {
            if re.is_match(&entry.path().to_string_lossy()) {
                continue;
            }
        }
        out.push(FileRecord { path: entry.into_path(), size_bytes: size });
    }
    out
}
