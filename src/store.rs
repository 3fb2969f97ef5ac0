// Snapkeep - 配置文件存储模块
// 负责管理用户配置文件的加载和保存

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

/// 备份配置文件（Profile）
///
/// 定义单个备份任务的所有配置参数，保存在全局配置文件中。
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Profile {
    /// 源路径（要备份的目录或单个文件）
    pub source: PathBuf,

    /// 备份目标路径
    pub destination: PathBuf,

    /// 忽略名单（裸名称）
    pub ignore: Vec<String>,

    /// strftime 风格的名称格式
    pub name_format: String,

    /// 归档格式名称（zip / tar / gztar / bztar / xztar / noarchive）
    pub archive_type: String,

    /// 是否把源名称拼进备份名
    pub keep_name: bool,

    /// 清理时要保留的去重后备份数量
    pub retain: usize,
}

/// 应用程序全局配置
///
/// 包含所有用户定义的备份配置文件（Profile）。
/// 配置文件存储在系统标准配置目录中。
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// 配置文件集合，键为配置文件名称
    pub profiles: HashMap<String, Profile>,
}

impl AppConfig {
    /// 从配置文件加载应用配置
    ///
    /// # 返回
    /// * `Ok(AppConfig)` - 加载的配置，如果文件不存在则返回空配置
    /// * `Err(anyhow::Error)` - 如果配置文件存在但解析失败
    pub fn load() -> Result<Self> {
        let path = Self::get_config_path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// 保存配置到文件
    ///
    /// 如果配置目录不存在，会自动创建。
    ///
    /// # 返回
    /// * `Ok(())` - 配置保存成功
    /// * `Err(anyhow::Error)` - 保存失败
    pub fn save(&self) -> Result<()> {
        let path = Self::get_config_path()?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content).context("Failed to write config file")
    }

    /// 获取配置文件的路径
    ///
    /// 使用 `directories` crate 获取平台标准的配置目录：
    /// - Windows: `C:\Users\<用户>\AppData\Roaming\snapkeep\config.toml`
    /// - macOS: `~/Library/Application Support/snapkeep/config.toml`
    /// - Linux: `~/.config/snapkeep/config.toml`
    fn get_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "snapkeep")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_round_trips_through_toml() {
        let mut config = AppConfig::default();
        config.profiles.insert(
            "proj".to_string(),
            Profile {
                source: PathBuf::from("/data/proj"),
                destination: PathBuf::from("/backups"),
                ignore: vec!["node_modules".to_string()],
                name_format: "%Y%m%d_%H%M%S".to_string(),
                archive_type: "gztar".to_string(),
                keep_name: true,
                retain: 7,
            },
        );

        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&text).unwrap();
        let profile = &parsed.profiles["proj"];
        assert_eq!(profile.archive_type, "gztar");
        assert_eq!(profile.retain, 7);
        assert!(profile.keep_name);
    }
}
