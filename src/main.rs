// Snapkeep - 带按天去重保留策略的时间戳快照工具
//
// 主程序入口，负责命令行参数解析和快照流程协调
//
// 功能特性：
// - 时间戳快照：目录树或单个文件的完整复制
// - 归档打包：zip / tar / gztar / bztar / xztar，或保留未压缩目录
// - 保留清理：同一天的备份去重后只保留最近的 N 个
// - 强制删除：清理时自动处理只读属性
// - 交互式配置管理：保存和管理备份配置

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use indicatif::ProgressBar;
use snapkeep::archive::ArchiveType;
use snapkeep::clean::clean_backups;
use snapkeep::cli::run_interactive_mode;
use snapkeep::config::{BackupConfig, DEFAULT_NAME_FORMAT};
use snapkeep::error::BackupError;
use snapkeep::snapshot::create_snapshot;
use snapkeep::utils::{format_bytes, format_duration};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 子命令枚举
#[derive(Subcommand, Debug)]
enum Commands {
    /// 清理旧备份（按天去重后只保留最近的 N 个）
    Clean {
        /// 要保留的去重后备份数量（0 会删除所有识别出的备份）
        #[arg(long, default_value_t = 5)]
        keep: usize,

        /// 要清理的目标路径
        #[arg(value_name = "DESTINATION")]
        destination: Option<PathBuf>,
    },
}

/// 命令行参数结构体
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 子命令
    #[command(subcommand)]
    command: Option<Commands>,

    /// 源路径（目录或单个文件）
    #[arg(value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// 目标路径
    #[arg(value_name = "DESTINATION")]
    destination: Option<PathBuf>,

    /// 忽略名单中的裸名称（可重复指定）
    #[arg(long, global = true)]
    ignore: Vec<String>,

    /// strftime 风格的名称格式（渲染宽度必须固定）
    #[arg(long, global = true, default_value = DEFAULT_NAME_FORMAT)]
    name_format: String,

    /// 归档格式
    #[arg(long, global = true, default_value = "zip", value_parser = parse_archive_type)]
    archive: ArchiveType,

    /// 把源名称（去掉扩展名）拼进备份名
    #[arg(long, global = true)]
    keep_name: bool,

    /// 创建快照后自动清理，保留最近的 N 个（0 表示不自动清理）
    #[arg(long, global = true, default_value_t = 0)]
    retain: usize,

    /// 试运行模式（不实际写入或删除）
    #[arg(long, global = true)]
    dry_run: bool,
}

/// clap 的归档格式解析器，未知名称给出类型化错误
fn parse_archive_type(s: &str) -> Result<ArchiveType, BackupError> {
    ArchiveType::from_str(s)
}

/// 程序入口
fn main() -> Result<()> {
    let args = Args::parse();

    match &args.command {
        Some(Commands::Clean { keep, destination }) => {
            // 处理清理命令
            let dest = destination
                .as_ref()
                .or(args.destination.as_ref())
                .context("Destination path is required for clean command")?;

            let report = clean_backups(dest, &args.name_format, *keep, args.dry_run)?;
            println!(
                "Listed {} entr(ies), recognized {} backup(s), removed {}.",
                report.listed.len(),
                report.recognized.len(),
                style(report.removed.len()).bold()
            );
        }
        None => {
            // 执行快照创建
            run_backup(args)?;
        }
    }
    Ok(())
}

/// 执行快照创建操作
fn run_backup(args: Args) -> Result<()> {
    // 准备备份配置
    let config = if let (Some(src), Some(dest)) = (args.source, args.destination) {
        // 使用命令行参数指定的路径
        let source_abs =
            std::fs::canonicalize(&src).map_err(|_| BackupError::SourceNotFound(src.clone()))?;

        BackupConfig::new(
            source_abs,
            dest,
            args.ignore,
            args.name_format.clone(),
            args.archive,
            args.keep_name,
            args.retain,
            args.dry_run,
        )?
    } else {
        // 进入交互模式
        run_interactive_mode(args.dry_run)?
    };

    // 记录开始时间
    let start_time = std::time::Instant::now();

    // 打印备份信息
    println!(
        "{}",
        style(format!("Snapkeep Snapshot Tool v{}", env!("CARGO_PKG_VERSION")))
            .cyan()
            .bold()
    );
    println!("Source:  {:?}", style(&config.source).blue());
    println!("Dest:    {:?}", style(&config.destination).blue());
    println!("Archive: {}", style(config.archive_type).yellow());
    println!(
        "{}",
        style("----------------------------------------").dim()
    );

    // 复制和打包是仅有的耗时阶段，挂一个转轮
    let spinner = ProgressBar::new_spinner();
    spinner.set_message("Creating snapshot...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = create_snapshot(&config);
    spinner.finish_and_clear();
    let outcome = outcome?;

    // 打印快照统计信息
    println!(
        "{}",
        style("----------------------------------------").dim()
    );
    println!("{}", style("Snapshot Created Successfully!").green().bold());
    println!("Artifact:         {:?}", style(&outcome.artifact).blue());
    println!("Files Copied:     {}", outcome.stats.files_copied);
    println!(
        "Data Transferred: {}",
        style(format_bytes(outcome.stats.bytes_copied)).cyan()
    );
    println!(
        "Total Duration:   {}",
        style(format_duration(start_time.elapsed().as_secs())).bold()
    );

    // 配置了保留数量时，创建完成后顺手清理旧备份
    if config.retain > 0 {
        println!(
            "{}",
            style("----------------------------------------").dim()
        );
        let report = clean_backups(
            &config.destination,
            &config.name_format,
            config.retain,
            config.dry_run,
        )?;
        if report.removed.is_empty() {
            println!("Nothing to prune.");
        }
    }

    Ok(())
}
