//! 流水线参数：初始值来自策略文件，升级规则可按键覆盖
//!
//! 所有阶段拿到的都是参数的只读快照；唯一写者是编排器。

use serde::Deserialize;
use tracing::warn;

/// 运行参数（策略 `[initial.params]` 段；缺省值即原始启发式的默认档）
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScanParams {
    /// 单文件大小上限（MiB），超过则枚举阶段跳过
    pub max_mb: u64,
    /// 工作线程数；0 表示自动（CPU 核数）
    pub threads: usize,
    /// 每个扫描工作单元包含的路径数
    pub chunk_size: usize,
    /// 优先使用多线程搜索工具（rg），否则退回 grep
    pub prefer_rg: bool,
    /// 路径排除正则（大小写不敏感），空字符串等价于不排除
    pub exclude: Option<String>,
    /// 按目录名剪枝（进入递归前剔除）
    pub prune_dirs: Vec<String>,
    /// 单个 chunk 的外部工具超时（秒）
    pub chunk_timeout_s: u64,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            max_mb: 256,
            threads: 6,
            chunk_size: 2000,
            prefer_rg: true,
            exclude: None,
            prune_dirs: vec!["node_modules".into(), ".git".into(), ".cache".into()],
            chunk_timeout_s: 900,
        }
    }
}

impl ScanParams {
    /// 生效线程数（0 → CPU 核数）
    pub fn effective_threads(&self) -> usize {
        if self.threads == 0 {
            num_cpus::get()
        } else {
            self.threads
        }
    }

    /// 大小上限换算为字节
    pub fn size_limit_bytes(&self) -> u64 {
        self.max_mb.saturating_mul(1024 * 1024)
    }

    /// 应用一条升级规则的参数覆盖；未知键或类型不符只告警、不生效
    pub fn apply_update(&mut self, key: &str, value: &toml::Value) {
        match key {
            "max_mb" => {
                if let Some(v) = value.as_integer() {
                    self.max_mb = v.max(0) as u64;
                    return;
                }
            }
            "threads" => {
                if let Some(v) = value.as_integer() {
                    self.threads = v.max(0) as usize;
                    return;
                }
            }
            "chunk_size" => {
                if let Some(v) = value.as_integer() {
                    if v >= 1 {
                        self.chunk_size = v as usize;
                        return;
                    }
                }
            }
            "prefer_rg" => {
                if let Some(v) = value.as_bool() {
                    self.prefer_rg = v;
                    return;
                }
            }
            "exclude" => {
                if let Some(v) = value.as_str() {
                    self.exclude = if v.is_empty() { None } else { Some(v.to_string()) };
                    return;
                }
            }
            "chunk_timeout_s" => {
                if let Some(v) = value.as_integer() {
                    if v >= 1 {
                        self.chunk_timeout_s = v as u64;
                        return;
                    }
                }
            }
            _ => {}
        }
        warn!(key, %value, "ignoring unknown or ill-typed param update");
    }
}
