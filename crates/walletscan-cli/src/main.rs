use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use walletscan_core::{run_output_dir, write_run, Pipeline, Policy, StageId};

/// 命令行入口（基于 clap）
#[derive(Parser, Debug)]
#[command(name = "walletscan", version, about = "残留钱包秘密的取证扫描器")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 扫描一个或多个目标并在 <root>/_logs 下生成 JSON 产物
    Scan {
        /// 产物根目录（输出写到 <root>/_logs/walletscan_<epoch>）
        #[arg(long)]
        root: PathBuf,

        /// 扫描目标（可多次传入）
        #[arg(long, required = true)]
        target: Vec<PathBuf>,

        /// 策略文件（TOML）；缺省使用内置回退策略
        #[arg(long)]
        policy: Option<PathBuf>,

        /// 覆盖策略中的线程数
        #[arg(long)]
        threads: Option<usize>,

        /// 覆盖单文件大小上限（MiB）
        #[arg(long)]
        max_mb: Option<u64>,

        /// 覆盖路径排除正则（大小写不敏感）
        #[arg(long)]
        exclude: Option<String>,

        /// 优先使用 rg（默认行为；与 --no-prefer-rg 互补）
        #[arg(long)]
        prefer_rg: bool,

        #[arg(long = "no-prefer-rg")]
        no_prefer_rg: bool,

        /// 从一开始就启用模式规则阶段（升级引擎也可能自行追加）
        #[arg(long)]
        yara: bool,

        /// 外部 yara 规则文件（缺省用内置最小规则集）
        #[arg(long)]
        rules: Option<PathBuf>,

        /// 临时文件目录
        #[arg(long)]
        workdir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    // 日志等级由 RUST_LOG 控制，例如 info、debug
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Scan {
            root,
            target,
            policy,
            threads,
            max_mb,
            exclude,
            prefer_rg,
            no_prefer_rg,
            yara,
            rules,
            workdir,
        } => {
            // 策略缺失/非法是唯一的致命配置错误，任何阶段开始前就中止
            let mut policy = match policy {
                Some(path) => Policy::load(&path)
                    .with_context(|| format!("load policy {}", path.display()))?,
                None => Policy::builtin(),
            };
            if let Some(t) = threads {
                policy.params.threads = t;
            }
            if let Some(mb) = max_mb {
                policy.params.max_mb = mb;
            }
            if exclude.is_some() {
                policy.params.exclude = exclude;
            }
            // 两个开关都不传时沿用策略里的取值
            if prefer_rg {
                policy.params.prefer_rg = true;
            } else if no_prefer_rg {
                policy.params.prefer_rg = false;
            }

            info!(targets = target.len(), "starting scan");
            let mut pipeline = Pipeline::new(policy, target);
            if let Some(dir) = workdir {
                pipeline = pipeline.with_workdir(dir);
            }
            pipeline = pipeline.with_rules_path(rules);
            if yara {
                pipeline = pipeline.with_forced_stages(vec![StageId::PatternRules]);
            }

            let output = pipeline.run()?;
            let outdir = run_output_dir(&root);
            write_run(&outdir, &output).context("write run artifacts")?;

            info!(
                files = output.summary.files,
                hits = output.summary.hits,
                out = %outdir.display(),
                "scan finished"
            );
            // 末尾输出一行机器可读的汇总（含产物目录）
            println!(
                "{}",
                serde_json::json!({
                    "out": outdir,
                    "elapsed_s": output.summary.elapsed_s,
                    "files": output.summary.files,
                    "hits": output.summary.hits,
                    "hits_per_min": output.summary.hits_per_min,
                    "avg_score": output.summary.avg_score,
                })
            );
        }
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(env_filter).finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
