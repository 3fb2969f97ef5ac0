// Snapkeep - 带按天去重保留策略的时间戳快照工具
// 模块声明文件

/// 归档格式和归档创建模块
pub mod archive;

/// 备份清理模块（按天去重 + 保留窗口）
pub mod clean;

/// 命令行交互界面模块
pub mod cli;

/// 备份配置管理模块
pub mod config;

/// 备份条目解析模块（从文件名解析时间戳）
pub mod entry;

/// 错误类型定义模块
pub mod error;

/// 快照创建模块
pub mod snapshot;

/// 配置文件存储模块
pub mod store;

/// 工具函数模块
pub mod utils;
