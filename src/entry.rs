// Snapkeep - 备份条目解析模块
// 负责从目标目录中的条目名称解析出时间戳和后缀

use crate::error::BackupError;
use chrono::format::{Item, StrftimeItems};
use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};

/// 备份条目
///
/// 表示目标目录下的一个备份项（归档文件或未压缩的备份目录）。
/// 通过解析条目名称的时间戳前缀构造，解析失败的条目不是备份。
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    /// 文件系统中的原始条目名称
    pub name: String,

    /// 从名称前缀解析出的时间戳
    pub timestamp: NaiveDateTime,

    /// 后缀（归档扩展名）。目录形式的备份没有后缀，为 `None`
    pub suffix: Option<String>,
}

/// 校验名称格式是否为合法的 strftime 模式
///
/// 含有未知占位符的格式在渲染时会中止进程，必须在任何渲染
/// 发生之前拒绝。
///
/// # 参数
/// * `name_format` - strftime 风格的名称格式
///
/// # 返回
/// * `Ok(())` - 格式合法
/// * `Err(BackupError::InvalidNameFormat)` - 格式中有未知占位符
pub fn validate_name_format(name_format: &str) -> Result<(), BackupError> {
    let broken = StrftimeItems::new(name_format).any(|item| matches!(item, Item::Error));
    if broken {
        return Err(BackupError::InvalidNameFormat(name_format.to_string()));
    }
    Ok(())
}

/// 计算名称格式渲染后的字符长度
///
/// 先校验格式，再用当前时间渲染一次格式字符串，取其长度作为
/// 时间戳前缀的长度。这假设格式的渲染宽度在所有日期下都是固定
/// 的（例如零填充的 `%Y%m%d_%H%M%S`）；宽度不固定的格式（如非
/// 零填充分量）会破坏解析，这是一个已文档化的约束而不是需要
/// 悄悄绕过的缺陷。
///
/// # 参数
/// * `name_format` - strftime 风格的名称格式
///
/// # 返回
/// * `Ok(usize)` - 渲染后的字符长度
/// * `Err(BackupError::InvalidNameFormat)` - 格式非法
pub fn rendered_len(name_format: &str) -> Result<usize, BackupError> {
    validate_name_format(name_format)?;
    Ok(Local::now().format(name_format).to_string().chars().count())
}

impl BackupEntry {
    /// 从原始条目名称解析备份条目
    ///
    /// # 参数
    /// * `raw_name` - 文件系统中的条目名称（文件或目录）
    /// * `prefix_len` - 时间戳前缀的长度（由 [`rendered_len`] 计算）
    /// * `name_format` - strftime 风格的名称格式
    ///
    /// # 返回
    /// * `Ok(BackupEntry)` - 名称前缀符合格式，解析成功
    /// * `Err(BackupError::MalformedBackupName)` - 前缀不符合格式，
    ///   该条目不是备份。调用方应逐条捕获并跳过，而不是中断扫描
    pub fn parse(
        raw_name: &str,
        prefix_len: usize,
        name_format: &str,
    ) -> Result<Self, BackupError> {
        let malformed = || BackupError::MalformedBackupName(raw_name.to_string());

        // 名称太短（或切在多字节字符中间）直接视为非备份
        let prefix: String = raw_name.chars().take(prefix_len).collect();
        if prefix.chars().count() < prefix_len {
            return Err(malformed());
        }

        let timestamp = parse_timestamp(&prefix, name_format).ok_or_else(malformed)?;

        // 后缀提取是基于切片的（不是基于正则的）：只要名称中任意位置
        // 出现 `.`，就从 prefix_len + 1 开始切。嵌入点号的目录名会因此
        // 得到一个意外的后缀，这一行为被刻意保留
        let suffix = if !raw_name.contains('.') {
            None
        } else {
            Some(raw_name.chars().skip(prefix_len + 1).collect())
        };

        Ok(Self {
            name: raw_name.to_string(),
            timestamp,
            suffix,
        })
    }

    /// 分组键：日历日期（丢弃一天内的时间）
    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }
}

/// 按名称格式解析时间戳前缀
///
/// 仅包含日期分量的格式（如 `%Y%m%d`）解析为当天零点。
fn parse_timestamp(prefix: &str, name_format: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(prefix, name_format) {
        return Some(dt);
    }
    NaiveDate::parse_from_str(prefix, name_format)
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN))
}

/// 找出一组备份条目中时间戳最大（最新）的一个
///
/// 线性扫描：第一个元素作为种子，严格更大才替换。
/// 因此两个时间戳完全相同的条目中，先出现的胜出。
///
/// # 参数
/// * `entries` - 同一天的备份条目
///
/// # 返回
/// * `Some(&BackupEntry)` - 最新的条目
/// * `None` - 输入为空
pub fn newest_of(entries: &[BackupEntry]) -> Option<&BackupEntry> {
    let (first, rest) = entries.split_first()?;
    let mut newest = first;
    for entry in rest {
        if entry.timestamp > newest.timestamp {
            newest = entry;
        }
    }
    Some(newest)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FMT: &str = "%Y%m%d_%H%M%S";
    const LEN: usize = 15; // "20240101_120000"

    #[test]
    fn parses_archive_file_name() {
        let e = BackupEntry::parse("20240101_120000.zip", LEN, FMT).unwrap();
        assert_eq!(e.timestamp.to_string(), "2024-01-01 12:00:00");
        assert_eq!(e.suffix.as_deref(), Some("zip"));
    }

    #[test]
    fn creator_style_names_keep_a_nonempty_suffix() {
        // 创建器生成的文件名形如 "{stamp}_{base}.{ext}"，
        // 切片得到的后缀包含 base，但非空即可触发按文件删除
        let e = BackupEntry::parse("20240101_120000_proj.zip", LEN, FMT).unwrap();
        assert_eq!(e.suffix.as_deref(), Some("proj.zip"));
    }

    #[test]
    fn parses_directory_name_without_suffix() {
        let e = BackupEntry::parse("20240101_120000_myproj", LEN, FMT).unwrap();
        assert_eq!(e.suffix, None);
        assert_eq!(e.date(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn rejects_unrelated_names() {
        assert!(BackupEntry::parse("readme.txt", LEN, FMT).is_err());
        assert!(BackupEntry::parse("notes", LEN, FMT).is_err());
        assert!(BackupEntry::parse("2024_backup.zip", LEN, FMT).is_err());
    }

    #[test]
    fn rejects_names_shorter_than_prefix() {
        assert!(BackupEntry::parse("202401", LEN, FMT).is_err());
        assert!(BackupEntry::parse("", LEN, FMT).is_err());
    }

    #[test]
    fn date_only_format_parses_to_midnight() {
        let e = BackupEntry::parse("20240315", 8, "%Y%m%d").unwrap();
        assert_eq!(e.timestamp.to_string(), "2024-03-15 00:00:00");
    }

    #[test]
    fn dotted_directory_name_gets_sliced_suffix() {
        // 嵌入点号的目录名：后缀提取仍从 prefix_len + 1 开始切
        let e = BackupEntry::parse("20240101_120000_my.dir", LEN, FMT).unwrap();
        assert_eq!(e.suffix.as_deref(), Some("my.dir"));
    }

    #[test]
    fn newest_of_picks_latest_and_first_on_tie() {
        let a = BackupEntry::parse("20240101_120000_a", LEN, FMT).unwrap();
        let b = BackupEntry::parse("20240101_180000_b", LEN, FMT).unwrap();
        let c = BackupEntry::parse("20240101_180000_c", LEN, FMT).unwrap();

        let group = vec![a.clone(), b.clone(), c.clone()];
        assert_eq!(newest_of(&group).unwrap().name, b.name);

        assert!(newest_of(&[]).is_none());
    }

    #[test]
    fn rendered_len_matches_default_format() {
        assert_eq!(rendered_len(FMT).unwrap(), 15);
    }

    #[test]
    fn unknown_specifier_is_an_error_not_a_panic() {
        assert!(matches!(
            rendered_len("%J"),
            Err(BackupError::InvalidNameFormat(_))
        ));
        assert!(matches!(
            validate_name_format("%Y%m%d_%Q"),
            Err(BackupError::InvalidNameFormat(_))
        ));
        assert!(validate_name_format(FMT).is_ok());
    }
}
