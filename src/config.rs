// Snapkeep - 备份配置管理模块
// 负责创建和管理单次备份任务的配置

use crate::archive::ArchiveType;
use crate::store::Profile;
use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// 默认的名称格式（ISO 风格，零填充，渲染宽度固定）
pub const DEFAULT_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 备份配置结构体
///
/// 定义单次快照操作的所有参数。配置总是作为显式记录传入每次
/// 调用，不存在进程级的"上次使用的配置"这类隐式状态。
#[derive(Debug, Clone)]
pub struct BackupConfig {
    /// 源路径（要备份的目录或单个文件）
    pub source: PathBuf,

    /// 目标路径（备份存储位置）
    pub destination: PathBuf,

    /// 忽略名单（裸名称，不是路径，也不是通配模式）
    pub ignore: Vec<String>,

    /// strftime 风格的名称格式
    pub name_format: String,

    /// 归档格式
    pub archive_type: ArchiveType,

    /// 是否把源的名称（去掉扩展名）拼进备份名
    pub keep_name: bool,

    /// 清理时要保留的去重后备份数量
    pub retain: usize,

    /// 是否为试运行模式（不实际写入）
    pub dry_run: bool,
}

impl BackupConfig {
    /// 创建新的备份配置
    ///
    /// # 参数
    /// * `source` - 源路径
    /// * `destination` - 目标路径
    /// * `ignore` - 忽略名单（裸名称）
    /// * `name_format` - strftime 风格的名称格式
    /// * `archive_type` - 归档格式
    /// * `keep_name` - 是否保留源名称
    /// * `retain` - 清理时保留的备份数量
    /// * `dry_run` - 是否为试运行模式
    ///
    /// # 返回
    /// * `Ok(BackupConfig)` - 创建的备份配置
    /// * `Err(anyhow::Error)` - 处理 `.snapkeepignore` 失败
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        source: PathBuf,
        destination: PathBuf,
        ignore: Vec<String>,
        name_format: String,
        archive_type: ArchiveType,
        keep_name: bool,
        retain: usize,
        dry_run: bool,
    ) -> Result<Self> {
        let mut config = Self {
            source,
            destination,
            ignore,
            name_format,
            archive_type,
            keep_name,
            retain,
            dry_run,
        };

        // 处理 .snapkeepignore 文件，保持与 from_profile 一致
        config.process_ignore_file()?;

        Ok(config)
    }

    /// 从配置文件（Profile）创建备份配置
    ///
    /// 归档格式字符串在这里就被解析，未知格式在任何复制动作
    /// 开始之前失败。
    ///
    /// # 参数
    /// * `profile` - 保存的配置文件
    /// * `dry_run` - 是否为试运行模式
    ///
    /// # 返回
    /// * `Ok(BackupConfig)` - 创建的备份配置
    /// * `Err(anyhow::Error)` - 归档格式未知或处理忽略文件失败
    pub fn from_profile(profile: &Profile, dry_run: bool) -> Result<Self> {
        let archive_type: ArchiveType = profile.archive_type.parse()?;

        let mut config = Self {
            source: profile.source.clone(),
            destination: profile.destination.clone(),
            ignore: profile.ignore.clone(),
            name_format: profile.name_format.clone(),
            archive_type,
            keep_name: profile.keep_name,
            retain: profile.retain,
            dry_run,
        };

        config.process_ignore_file()?;

        Ok(config)
    }

    /// 处理 `.snapkeepignore` 文件
    ///
    /// 仅当源是目录时适用。如果文件不存在，会自动创建一个默认的
    /// 忽略文件，然后读取并把其中的裸名称并入忽略名单。
    /// 试运行模式下缺失的文件不会被创建。
    fn process_ignore_file(&mut self) -> Result<()> {
        if !self.source.is_dir() {
            return Ok(());
        }

        let ignore_file_path = self.source.join(".snapkeepignore");

        if !ignore_file_path.exists() {
            // 试运行不向源目录写入任何东西，也就没有可并入的名单
            if self.dry_run {
                return Ok(());
            }
            self.create_default_ignore_file(&ignore_file_path)?;
        }

        let content =
            fs::read_to_string(&ignore_file_path).context("Failed to read .snapkeepignore")?;

        for line in content.lines() {
            let line = line.trim();
            // 跳过空行和注释行
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            // 避免重复添加
            if !self.ignore.contains(&line.to_string()) {
                self.ignore.push(line.to_string());
            }
        }

        Ok(())
    }

    /// 创建默认的 `.snapkeepignore` 文件
    fn create_default_ignore_file(&self, path: &PathBuf) -> Result<()> {
        let mut default_content = String::from(
            "# Snapkeep Ignore File\n# One bare file or directory name per line\n\n# --- Common ---\n.git\n.svn\n.DS_Store\nThumbs.db\n\n"
        );

        // Windows 特定的排除项
        #[cfg(windows)]
        {
            default_content.push_str(
                "# --- Windows System ---\nSystem Volume Information\n$RECYCLE.BIN\npagefile.sys\nhiberfil.sys\nswapfile.sys\n"
            );
        }

        // Linux/macOS 特定的排除项
        #[cfg(not(windows))]
        {
            default_content.push_str("# --- Linux/macOS ---\nlost+found\n");
        }

        let mut file = fs::File::create(path).context("Failed to create .snapkeepignore")?;
        file.write_all(default_content.as_bytes())?;

        println!("Created default ignore file at: {:?}", path);

        Ok(())
    }
}
