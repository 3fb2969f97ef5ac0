// Snapkeep - 命令行交互界面模块
// 提供交互式命令行界面，用于管理备份配置文件

use anyhow::{Context, Result};
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};
use std::path::PathBuf;

use crate::config::{BackupConfig, DEFAULT_NAME_FORMAT};
use crate::store::{AppConfig, Profile};

/// 可选的归档格式名称（与 `ArchiveType::from_str` 一致）
const ARCHIVE_CHOICES: [&str; 6] = ["zip", "tar", "gztar", "bztar", "xztar", "noarchive"];

/// 运行交互式模式
///
/// 此函数提供交互式命令行界面，允许用户：
/// - 选择已保存的配置文件（Profile）
/// - 创建新的配置文件
/// - 删除配置文件
/// - 退出程序
///
/// # 参数
/// * `dry_run` - 是否为试运行模式
///
/// # 返回
/// * `Ok(BackupConfig)` - 选中配置文件对应的备份配置
/// * `Err(anyhow::Error)` - 操作失败
pub fn run_interactive_mode(dry_run: bool) -> Result<BackupConfig> {
    // 加载应用配置
    let mut app_config = AppConfig::load()?;
    let theme = ColorfulTheme::default();

    // 显示欢迎信息
    println!(
        "{}",
        style(format!("Snapkeep Snapshot Tool v{}", env!("CARGO_PKG_VERSION")))
            .cyan()
            .bold()
    );
    println!(
        "{}",
        style("----------------------------------------").dim()
    );

    loop {
        // 获取所有配置文件名称并排序
        let mut profiles: Vec<String> = app_config.profiles.keys().cloned().collect();
        profiles.sort();

        // 构建菜单选项，显示 profile 详情
        let mut choices: Vec<String> = profiles
            .iter()
            .map(|name| {
                if let Some(profile) = app_config.profiles.get(name) {
                    let src = profile.source.to_string_lossy();
                    let dst = profile.destination.to_string_lossy();
                    format!(
                        "{} ({} → {}) [{}, keep {}]",
                        name, src, dst, profile.archive_type, profile.retain
                    )
                } else {
                    name.clone()
                }
            })
            .collect();

        choices.push(">> Create New Profile".to_string());
        if !profiles.is_empty() {
            choices.push(">> Delete Profile".to_string());
        }
        choices.push(">> Exit".to_string());

        // 显示选择菜单
        let selection = Select::with_theme(&theme)
            .with_prompt("Select a backup profile")
            .default(0)
            .items(&choices)
            .interact()?;

        let choice = &choices[selection];

        if choice == ">> Exit" {
            // 用户选择退出
            std::process::exit(0);
        } else if choice == ">> Create New Profile" {
            // 创建新配置文件
            create_new_profile(&mut app_config)?;
            continue;
        } else if choice == ">> Delete Profile" {
            // 删除配置文件
            delete_profile(&mut app_config)?;
            continue;
        } else {
            // 用户选择了一个配置文件
            // selection 索引对应 profiles 数组
            let profile_name = &profiles[selection];
            let profile = app_config.profiles.get(profile_name).unwrap();

            // 源路径必须存在才能继续
            std::fs::canonicalize(&profile.source)
                .context("Source path in profile does not exist")?;

            // 从配置文件创建备份配置
            return BackupConfig::from_profile(profile, dry_run);
        }
    }
}

/// 创建新的配置文件（Profile）
///
/// 引导用户输入配置文件的各项参数，并保存到配置文件中。
///
/// # 参数
/// * `config` - 可变的应用配置引用
///
/// # 返回
/// * `Ok(())` - 创建成功
/// * `Err(anyhow::Error)` - 创建失败
fn create_new_profile(config: &mut AppConfig) -> Result<()> {
    let theme = ColorfulTheme::default();

    // 获取配置文件名称
    let name: String = Input::with_theme(&theme)
        .with_prompt("Profile Name")
        .interact_text()?;

    // 获取源路径
    let source: String = Input::with_theme(&theme)
        .with_prompt("Source Path")
        .interact_text()?;

    // 获取备份目标路径
    let dest: String = Input::with_theme(&theme)
        .with_prompt("Backup Destination Path")
        .interact_text()?;

    // 获取名称格式（必须是渲染宽度固定的格式）
    let name_format: String = Input::with_theme(&theme)
        .with_prompt("Name Format (strftime, fixed width)")
        .default(DEFAULT_NAME_FORMAT.to_string())
        .interact_text()?;

    // 选择归档格式
    let archive_idx = Select::with_theme(&theme)
        .with_prompt("Archive Type")
        .default(0)
        .items(&ARCHIVE_CHOICES)
        .interact()?;

    // 是否把源名称拼进备份名
    let keep_name = Confirm::with_theme(&theme)
        .with_prompt("Append source name to backup name?")
        .default(false)
        .interact()?;

    // 清理时保留多少个去重后的备份
    let retain: usize = Input::with_theme(&theme)
        .with_prompt("Backups to keep on clean")
        .default(5)
        .interact_text()?;

    // 创建新的配置文件
    let profile = Profile {
        source: PathBuf::from(source),
        destination: PathBuf::from(dest),
        ignore: vec![],
        name_format,
        archive_type: ARCHIVE_CHOICES[archive_idx].to_string(),
        keep_name,
        retain,
    };

    // 保存到配置文件
    config.profiles.insert(name, profile);
    config.save()?;
    println!("Profile saved successfully!");
    Ok(())
}

/// 删除配置文件（Profile）
///
/// 显示配置文件列表供用户选择删除。
///
/// # 参数
/// * `config` - 可变的应用配置引用
///
/// # 返回
/// * `Ok(())` - 删除成功（或用户取消）
/// * `Err(anyhow::Error)` - 删除失败
fn delete_profile(config: &mut AppConfig) -> Result<()> {
    // 获取并排序所有配置文件名称
    let mut profiles: Vec<String> = config.profiles.keys().cloned().collect();
    if profiles.is_empty() {
        println!("{}", style("No profiles available to delete.").yellow());
        return Ok(());
    }
    profiles.sort();

    // 显示选择菜单
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a profile to DELETE")
        .items(&profiles)
        .interact()?;

    let profile_name = &profiles[selection];

    // 确认删除
    if Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Are you sure you want to delete profile '{}'?",
            style(profile_name).red().bold()
        ))
        .default(false)
        .interact()?
    {
        // 删除配置文件
        config.profiles.remove(profile_name);
        config.save()?;
        println!(
            "{} '{}' has been deleted.",
            style("Success:").green(),
            profile_name
        );
    } else {
        println!("Operation cancelled.");
    }

    Ok(())
}
