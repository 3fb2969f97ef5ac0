// Snapkeep - 错误类型定义模块
// 定义可被调用方识别的失败条件

use std::path::PathBuf;
use thiserror::Error;

/// 备份操作的类型化失败条件
///
/// 这些错误通过 `anyhow` 向上传播，调用方（和测试）可以通过
/// `downcast_ref::<BackupError>()` 区分具体的失败原因。
#[derive(Debug, Error)]
pub enum BackupError {
    /// 条目名称的前缀不符合当前的时间戳名称格式
    ///
    /// 清理扫描时逐条捕获此错误并将条目排除在备份集之外，
    /// 绝不会因此中断整次扫描。
    #[error("entry name {0:?} does not match the active name format")]
    MalformedBackupName(String),

    /// 备份源路径不存在
    #[error("source path does not exist: {0:?}")]
    SourceNotFound(PathBuf),

    /// 备份目标目录不可写
    #[error("destination is not writable: {0:?}")]
    DestinationUnwritable(PathBuf),

    /// 不支持的归档格式
    #[error("unsupported archive type: {0:?} (expected one of: zip, tar, gztar, bztar, xztar, noarchive)")]
    UnsupportedArchiveType(String),

    /// 名称格式中包含无法识别的 strftime 占位符
    ///
    /// 渲染这样的格式会中止进程，所以在任何渲染发生之前校验并
    /// 以错误报告。
    #[error("invalid name format {0:?}: unrecognized strftime specifier")]
    InvalidNameFormat(String),
}
