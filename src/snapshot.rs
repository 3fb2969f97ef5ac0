// Snapkeep - 快照创建模块
// 负责生成带时间戳的备份名称、复制源内容并按需打包

use crate::archive::{make_archive, ArchiveType};
use crate::config::BackupConfig;
use crate::entry::validate_name_format;
use crate::error::BackupError;
use crate::utils::force_remove_tree;
use anyhow::{Context, Result};
use chrono::Local;
use console::style;
use filetime::FileTime;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 快照统计信息
#[derive(Debug, Default, Clone)]
pub struct SnapshotStats {
    /// 复制的文件数量
    pub files_copied: u64,

    /// 复制的总字节数
    pub bytes_copied: u64,
}

/// 快照结果
#[derive(Debug)]
pub struct SnapshotOutcome {
    /// 最终产物的路径（归档文件、未压缩目录或复制出的单个文件）
    pub artifact: PathBuf,

    /// 复制统计
    pub stats: SnapshotStats,
}

/// 创建一次快照
///
/// 流程：
/// 1. 提前校验：源不存在、名称格式非法、目标不可写都在任何
///    复制动作之前失败
/// 2. 用当前时间渲染名称格式，组合出目标名称
///    `"{时间戳}_{源名称或空}"`（`keep_name` 关闭时结尾留一个
///    下划线）
/// 3. 目录源：按忽略名单递归复制到目标目录（已存在则合并），
///    然后按归档格式打包并强制删除未压缩副本；`noarchive` 时
///    直接保留未压缩目录
/// 4. 文件源：单文件复制为 `"{目标名称}.{源扩展名}"`，不打包
///
/// # 参数
/// * `config` - 备份配置
///
/// # 返回
/// * `Ok(SnapshotOutcome)` - 最终产物路径和复制统计
/// * `Err(anyhow::Error)` - 校验失败或复制 / 打包出错
pub fn create_snapshot(config: &BackupConfig) -> Result<SnapshotOutcome> {
    if !config.source.exists() {
        return Err(BackupError::SourceNotFound(config.source.clone()).into());
    }
    validate_name_format(&config.name_format)?;
    ensure_writable_destination(config)?;

    let stamp = Local::now().format(&config.name_format).to_string();
    let base = if config.keep_name {
        config
            .source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    } else {
        String::new()
    };
    // keep_name 关闭时 base 为空，名称以下划线结尾
    let target_name = format!("{}_{}", stamp, base);

    if config.source.is_file() {
        create_file_snapshot(config, &target_name)
    } else {
        create_dir_snapshot(config, &target_name)
    }
}

/// 校验目标目录可写，不存在时创建
///
/// 不可写的目标在任何复制动作之前就以
/// [`BackupError::DestinationUnwritable`] 失败。
fn ensure_writable_destination(config: &BackupConfig) -> Result<()> {
    let dest = &config.destination;

    if !dest.exists() {
        if config.dry_run {
            println!(
                "{} Would create destination {:?}",
                style("Dry run:").yellow(),
                dest
            );
            return Ok(());
        }
        fs::create_dir_all(dest)
            .map_err(|_| BackupError::DestinationUnwritable(dest.to_path_buf()))?;
        return Ok(());
    }

    let meta = fs::metadata(dest)
        .map_err(|_| BackupError::DestinationUnwritable(dest.to_path_buf()))?;
    if !meta.is_dir() || meta.permissions().readonly() {
        return Err(BackupError::DestinationUnwritable(dest.to_path_buf()).into());
    }
    Ok(())
}

/// 单文件快照：复制到 `目标/{名称}.{源扩展名}`，从不打包
///
/// 与目录复制一样保留源文件的修改时间。
fn create_file_snapshot(config: &BackupConfig, target_name: &str) -> Result<SnapshotOutcome> {
    let file_name = match config.source.extension() {
        Some(ext) => format!("{}.{}", target_name, ext.to_string_lossy()),
        // 没有扩展名的源直接用目标名称，不补尾点
        None => target_name.to_string(),
    };
    let dest_path = config.destination.join(file_name);

    let mut stats = SnapshotStats::default();
    if config.dry_run {
        println!(
            "{} Would copy {:?} to {:?}",
            style("Dry run:").yellow(),
            config.source,
            dest_path
        );
    } else {
        let bytes = fs::copy(&config.source, &dest_path)
            .with_context(|| format!("Failed to copy {:?} to {:?}", config.source, dest_path))?;
        preserve_times(&config.source, &dest_path)?;
        stats.files_copied = 1;
        stats.bytes_copied = bytes;
    }

    Ok(SnapshotOutcome {
        artifact: dest_path,
        stats,
    })
}

/// 目录快照：过滤复制整棵树，然后按需打包
fn create_dir_snapshot(config: &BackupConfig, target_name: &str) -> Result<SnapshotOutcome> {
    let tree_path = config.destination.join(target_name);

    if config.dry_run {
        println!(
            "{} Would copy tree {:?} to {:?}",
            style("Dry run:").yellow(),
            config.source,
            tree_path
        );
        if let Some(ext) = config.archive_type.extension() {
            let archive_path = config.destination.join(format!("{}.{}", target_name, ext));
            println!(
                "{} Would archive to {:?}",
                style("Dry run:").yellow(),
                archive_path
            );
            return Ok(SnapshotOutcome {
                artifact: archive_path,
                stats: SnapshotStats::default(),
            });
        }
        return Ok(SnapshotOutcome {
            artifact: tree_path,
            stats: SnapshotStats::default(),
        });
    }

    let stats = copy_tree(&config.source, &tree_path, &config.ignore)?;

    if config.archive_type == ArchiveType::NoArchive {
        return Ok(SnapshotOutcome {
            artifact: tree_path,
            stats,
        });
    }

    let ext = config
        .archive_type
        .extension()
        .expect("every archiving type has an extension");
    let archive_path = config.destination.join(format!("{}.{}", target_name, ext));

    make_archive(config.archive_type, &tree_path, &archive_path)
        .with_context(|| format!("Failed to create archive {:?}", archive_path))?;

    // 打包后未压缩副本就是多余的，强制删除（容忍只读属性）
    force_remove_tree(&tree_path)?;

    Ok(SnapshotOutcome {
        artifact: archive_path,
        stats,
    })
}

/// 按忽略名单递归复制目录树
///
/// 忽略名单按裸名称匹配（不是完整路径）：命中的目录整棵剪掉，
/// 命中的文件跳过。目标目录已存在时合并而不是报错。
/// 复制的文件保留源文件的修改时间。
fn copy_tree(source: &Path, dest: &Path, ignore: &[String]) -> Result<SnapshotStats> {
    let ignored: HashSet<&str> = ignore.iter().map(|s| s.as_str()).collect();
    let mut stats = SnapshotStats::default();

    let walker = WalkDir::new(source).into_iter().filter_entry(|e| {
        // 根目录自身不参与忽略匹配
        e.depth() == 0
            || e.file_name()
                .to_str()
                .map(|name| !ignored.contains(name))
                .unwrap_or(true)
    });

    for entry in walker {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .expect("walkdir yields paths under its root");
        let dest_path = dest.join(rel);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest_path)
                .with_context(|| format!("Failed to create dir {:?}", dest_path))?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let bytes = fs::copy(entry.path(), &dest_path).with_context(|| {
                format!("Failed to copy {:?} to {:?}", entry.path(), dest_path)
            })?;
            preserve_times(entry.path(), &dest_path)?;
            stats.files_copied += 1;
            stats.bytes_copied += bytes;
        }
    }

    Ok(stats)
}

/// 把源文件的访问 / 修改时间复制到目标文件
///
/// 只读的目标文件需要先取消只读才能设置时间戳，设置后恢复。
fn preserve_times(src: &Path, dest: &Path) -> Result<()> {
    let src_meta = fs::metadata(src)?;
    let mtime = FileTime::from_last_modification_time(&src_meta);
    let atime = FileTime::from_last_access_time(&src_meta);

    let dest_meta = fs::metadata(dest)?;
    let mut perms = dest_meta.permissions();
    let original_readonly = perms.readonly();

    if original_readonly {
        perms.set_readonly(false);
        fs::set_permissions(dest, perms.clone())
            .with_context(|| format!("Failed to unset readonly for {:?}", dest))?;
    }

    filetime::set_file_times(dest, atime, mtime)
        .with_context(|| format!("Failed to set time for {:?}", dest))?;

    if original_readonly {
        perms.set_readonly(true);
        fs::set_permissions(dest, perms)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NAME_FORMAT;
    use tempfile::tempdir;

    fn base_config(source: PathBuf, destination: PathBuf) -> BackupConfig {
        BackupConfig {
            source,
            destination,
            ignore: vec![],
            name_format: DEFAULT_NAME_FORMAT.to_string(),
            archive_type: ArchiveType::NoArchive,
            keep_name: false,
            retain: 0,
            dry_run: false,
        }
    }

    fn sample_source(root: &Path) -> PathBuf {
        let src = root.join("proj");
        fs::create_dir_all(src.join("docs")).unwrap();
        fs::create_dir_all(src.join("node_modules/dep")).unwrap();
        fs::write(src.join("main.rs"), b"fn main() {}").unwrap();
        fs::write(src.join("docs/guide.md"), b"# guide").unwrap();
        fs::write(src.join("node_modules/dep/index.js"), b"junk").unwrap();
        fs::write(src.join("secret.log"), b"log").unwrap();
        src
    }

    #[test]
    fn noarchive_leaves_uncompressed_tree() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");

        let config = base_config(src, dest.clone());
        let outcome = create_snapshot(&config).unwrap();

        assert!(outcome.artifact.is_dir());
        assert!(outcome.artifact.join("main.rs").exists());
        assert!(outcome.artifact.join("docs/guide.md").exists());
        assert_eq!(outcome.stats.files_copied, 4);
    }

    #[test]
    fn ignore_list_prunes_by_bare_name() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");

        let mut config = base_config(src, dest);
        config.ignore = vec!["node_modules".to_string(), "secret.log".to_string()];
        let outcome = create_snapshot(&config).unwrap();

        assert!(outcome.artifact.join("main.rs").exists());
        assert!(!outcome.artifact.join("node_modules").exists());
        assert!(!outcome.artifact.join("secret.log").exists());
        assert_eq!(outcome.stats.files_copied, 2);
    }

    #[test]
    fn zip_snapshot_removes_intermediate_copy() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");

        let mut config = base_config(src, dest.clone());
        config.archive_type = ArchiveType::Zip;
        let outcome = create_snapshot(&config).unwrap();

        assert!(outcome.artifact.extension().is_some_and(|e| e == "zip"));
        assert!(outcome.artifact.is_file());

        // 打包后目标目录下只剩归档文件，没有未压缩副本
        let entries: Vec<_> = fs::read_dir(&dest)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(entries, vec![outcome.artifact.clone()]);
    }

    #[test]
    fn file_snapshot_keeps_extension_and_name() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        fs::write(&src, b"important").unwrap();
        let dest = dir.path().join("backups");

        let mut config = base_config(src, dest);
        config.keep_name = true;
        config.archive_type = ArchiveType::Zip; // 单文件从不打包
        let outcome = create_snapshot(&config).unwrap();

        let name = outcome.artifact.file_name().unwrap().to_string_lossy();
        assert!(name.ends_with("_notes.txt"));
        assert_eq!(fs::read(&outcome.artifact).unwrap(), b"important");
    }

    #[test]
    fn dir_snapshot_name_keeps_trailing_underscore() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");

        let outcome = create_snapshot(&base_config(src, dest)).unwrap();
        let name = outcome.artifact.file_name().unwrap().to_string_lossy();
        assert!(name.ends_with('_'));
    }

    #[test]
    fn missing_source_fails_with_typed_error() {
        let dir = tempdir().unwrap();
        let config = base_config(dir.path().join("nope"), dir.path().join("backups"));

        let err = create_snapshot(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackupError>(),
            Some(BackupError::SourceNotFound(_))
        ));
    }

    #[test]
    fn readonly_destination_fails_before_copying() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");
        fs::create_dir_all(&dest).unwrap();
        let mut perms = fs::metadata(&dest).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&dest, perms.clone()).unwrap();

        let config = base_config(src, dest.clone());
        let err = create_snapshot(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<BackupError>(),
            Some(BackupError::DestinationUnwritable(_))
        ));

        // 留给 tempdir 清理
        perms.set_readonly(false);
        fs::set_permissions(&dest, perms).unwrap();
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");

        // 走 BackupConfig::new，让忽略文件处理也在试运行下跑一遍
        let config = BackupConfig::new(
            src.clone(),
            dest.clone(),
            vec![],
            DEFAULT_NAME_FORMAT.to_string(),
            ArchiveType::Zip,
            false,
            0,
            true,
        )
        .unwrap();
        let outcome = create_snapshot(&config).unwrap();

        assert!(!dest.exists());
        assert!(!outcome.artifact.exists());
        assert_eq!(outcome.stats.files_copied, 0);
        // 源目录也不能被动过
        assert!(!src.join(".snapkeepignore").exists());
    }

    #[test]
    fn invalid_name_format_fails_before_copying() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups");

        let mut config = base_config(src, dest.clone());
        config.name_format = "%Y%J".to_string();
        let err = create_snapshot(&config).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BackupError>(),
            Some(BackupError::InvalidNameFormat(_))
        ));
        assert!(!dest.exists());
    }

    #[test]
    fn file_snapshot_preserves_mtime() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("notes.txt");
        fs::write(&src, b"important").unwrap();
        let old = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(&src, old).unwrap();

        let config = base_config(src, dir.path().join("backups"));
        let outcome = create_snapshot(&config).unwrap();

        let meta = fs::metadata(&outcome.artifact).unwrap();
        assert_eq!(
            FileTime::from_last_modification_time(&meta).unix_seconds(),
            1_600_000_000
        );
    }

    #[test]
    fn merges_into_existing_tree() {
        let dir = tempdir().unwrap();
        let src = sample_source(dir.path());
        let dest = dir.path().join("backups/20240101_120000_");

        copy_tree(&src, &dest, &[]).unwrap();
        // 目标目录已存在时再复制一次必须合并而不是报错
        fs::write(src.join("extra.txt"), b"more").unwrap();
        let stats = copy_tree(&src, &dest, &[]).unwrap();

        assert_eq!(stats.files_copied, 5);
        assert!(dest.join("main.rs").exists());
        assert!(dest.join("docs/guide.md").exists());
        assert!(dest.join("extra.txt").exists());
    }
}
