// Snapkeep - 工具函数模块
// 提供强制删除（清除只读属性后重试）和格式化等辅助功能

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::Path;

/// 清除路径上的只读属性
///
/// 如果路径本来就可写则不做任何事。
fn clear_readonly(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    let mut perms = meta.permissions();
    if perms.readonly() {
        perms.set_readonly(false);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// 强制删除单个文件
///
/// 删除遇到权限错误时，清除该文件的只读属性并重试一次。
/// 恢复仅作用于出错的这一个路径。
///
/// # 参数
/// * `path` - 要删除的文件路径
///
/// # 返回
/// * `Ok(())` - 删除成功
/// * `Err(anyhow::Error)` - 重试后仍然失败
pub fn force_remove_file(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            clear_readonly(path).ok();
            fs::remove_file(path).with_context(|| format!("Failed to delete file {:?}", path))
        }
        Err(e) => Err(e).with_context(|| format!("Failed to delete file {:?}", path)),
    }
}

/// 强制删除整个目录树
///
/// 先尝试普通的递归删除；失败时退回到手动递归，
/// 在每个出错的路径上清除只读属性并重试该路径的删除。
/// 单个路径的恢复不会中断整棵树的删除。
///
/// # 参数
/// * `path` - 要删除的目录路径
///
/// # 返回
/// * `Ok(())` - 删除成功
/// * `Err(anyhow::Error)` - 重试后仍然失败
pub fn force_remove_tree(path: &Path) -> Result<()> {
    if fs::remove_dir_all(path).is_ok() {
        return Ok(());
    }
    remove_tree_recursive(path)
        .with_context(|| format!("Failed to delete directory tree {:?}", path))
}

fn remove_tree_recursive(path: &Path) -> io::Result<()> {
    // 只读目录会挡住其子项的删除，进入前先清掉
    clear_readonly(path)?;

    for entry in fs::read_dir(path)? {
        let child = entry?.path();
        let meta = fs::symlink_metadata(&child)?;
        if meta.is_dir() {
            remove_tree_recursive(&child)?;
        } else {
            remove_file_lenient(&child)?;
        }
    }

    match fs::remove_dir(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            clear_readonly(path)?;
            fs::remove_dir(path)
        }
        Err(e) => Err(e),
    }
}

fn remove_file_lenient(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            clear_readonly(path)?;
            fs::remove_file(path)
        }
        Err(e) => Err(e),
    }
}

/// 格式化字节数为人类可读的单位
///
/// # 示例
/// ```
/// use snapkeep::utils::format_bytes;
/// assert_eq!(format_bytes(1024), "1.00 KB");
/// assert_eq!(format_bytes(500), "500 B");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    const TB: u64 = GB * 1024;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// 格式化秒数为人类可读的时间长度
///
/// # 示例
/// ```
/// use snapkeep::utils::format_duration;
/// assert_eq!(format_duration(3661), "1h 1m 1s");
/// assert_eq!(format_duration(45), "45s");
/// ```
pub fn format_duration(secs: u64) -> String {
    if secs >= 3600 {
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    } else if secs >= 60 {
        let mins = secs / 60;
        let secs = secs % 60;
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}
