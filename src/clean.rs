// Snapkeep - 备份清理模块
// 扫描目标目录，按天去重后只保留最近的 N 个备份，删除其余的

use crate::entry::{newest_of, rendered_len, BackupEntry};
use crate::utils::{force_remove_file, force_remove_tree};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use console::style;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// 清理结果报告
#[derive(Debug, Default)]
pub struct CleanReport {
    /// 目标目录下列出的所有条目名称
    pub listed: Vec<String>,

    /// 其中被识别为备份的条目名称
    pub recognized: Vec<String>,

    /// 实际删除（dry-run 模式下为将要删除）的条目名称
    pub removed: Vec<String>,
}

/// 清理旧备份
///
/// 算法：
/// 1. 非递归列出 `destination` 下的所有条目
/// 2. 逐条尝试解析时间戳前缀，失败的条目不是备份，静默跳过
/// 3. 备份按日历日期分组，每组只留时间最新的一个
/// 4. 各组胜出者按时间戳升序排序，保留最后 `retain` 个
///    （`retain == 0` 时一个都不保留，所有识别出的备份都会被删除）
/// 5. 未被保留的备份全部删除：有后缀的按文件删，没有后缀的按
///    目录树递归删，遇到只读属性时清除后重试
///
/// # 参数
/// * `destination` - 备份目标根目录
/// * `name_format` - strftime 风格的名称格式
/// * `retain` - 要保留的去重后备份数量
/// * `dry_run` - 是否为试运行模式（不实际删除）
///
/// # 返回
/// * `Ok(CleanReport)` - 列出 / 识别 / 删除三个名单
/// * `Err(anyhow::Error)` - 读取目录或删除失败
pub fn clean_backups(
    destination: &Path,
    name_format: &str,
    retain: usize,
    dry_run: bool,
) -> Result<CleanReport> {
    let mut listed: Vec<String> = fs::read_dir(destination)
        .with_context(|| format!("Cannot read destination directory {:?}", destination))?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    listed.sort();

    // 识别备份：解析失败的条目（无关文件）被排除，绝不中断扫描
    let prefix_len = rendered_len(name_format)?;
    let candidates: Vec<BackupEntry> = listed
        .iter()
        .filter_map(|name| BackupEntry::parse(name, prefix_len, name_format).ok())
        .collect();
    let recognized: Vec<String> = candidates.iter().map(|e| e.name.clone()).collect();

    if candidates.is_empty() {
        return Ok(CleanReport {
            listed,
            recognized,
            removed: Vec::new(),
        });
    }

    // 按日历日期分组，每组选出时间最新的一个
    let mut groups: HashMap<NaiveDate, Vec<BackupEntry>> = HashMap::new();
    for entry in &candidates {
        groups.entry(entry.date()).or_default().push(entry.clone());
    }

    let mut winners: Vec<&BackupEntry> = groups
        .values()
        .filter_map(|group| newest_of(group))
        .collect();

    // 胜出者按时间戳升序，保留最后 retain 个
    winners.sort_by_key(|e| e.timestamp);
    let keep_from = winners.len().saturating_sub(retain);
    let kept: HashSet<&str> = if retain == 0 {
        HashSet::new()
    } else {
        winners[keep_from..].iter().map(|e| e.name.as_str()).collect()
    };

    // 删除所有未被保留的备份
    let mut removed = Vec::new();
    for entry in &candidates {
        if kept.contains(entry.name.as_str()) {
            continue;
        }
        let path = destination.join(&entry.name);
        if dry_run {
            println!(
                "{} Would delete: {:?}",
                style("Dry run:").yellow(),
                entry.name
            );
        } else {
            println!("Deleting: {:?}", style(&entry.name).red());
            remove_entry(&path, entry)?;
        }
        removed.push(entry.name.clone());
    }

    if !dry_run && !removed.is_empty() {
        println!(
            "{}",
            style(format!("Pruned {} old backup(s).", removed.len()))
                .green()
                .bold()
        );
    }

    Ok(CleanReport {
        listed,
        recognized,
        removed,
    })
}

/// 删除单个备份条目
///
/// 有后缀的按文件删，没有后缀的按目录树删。嵌入点号的目录名
/// 会被后缀切片误判为文件，文件删除失败时退回到目录树删除，
/// 避免这一已知误判中断整批清理。
fn remove_entry(path: &Path, entry: &BackupEntry) -> Result<()> {
    if entry.suffix.is_some() {
        match force_remove_file(path) {
            Ok(()) => Ok(()),
            Err(_) if path.is_dir() => force_remove_tree(path),
            Err(e) => Err(e),
        }
    } else {
        force_remove_tree(path)
    }
}
