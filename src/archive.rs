// Snapkeep - 归档格式和归档创建模块
// 负责把未压缩的快照目录打包成归档文件

use crate::error::BackupError;
use anyhow::{bail, Context, Result};
use std::fs::File;
use std::io;
use std::path::Path;
use std::str::FromStr;
use walkdir::WalkDir;

/// 归档格式
///
/// 配置文件和命令行中的取值为
/// `zip` / `tar` / `gztar` / `bztar` / `xztar` / `noarchive`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Tar,
    GzTar,
    BzTar,
    XzTar,
    /// 不打包，保留未压缩的快照目录
    NoArchive,
}

impl ArchiveType {
    /// 归档文件的扩展名（不含前导点）
    ///
    /// `NoArchive` 没有扩展名，返回 `None`。
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            ArchiveType::Zip => Some("zip"),
            ArchiveType::Tar => Some("tar"),
            ArchiveType::GzTar => Some("tar.gz"),
            ArchiveType::BzTar => Some("tar.bz2"),
            ArchiveType::XzTar => Some("tar.xz"),
            ArchiveType::NoArchive => None,
        }
    }

    /// 配置文件中使用的名称
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveType::Zip => "zip",
            ArchiveType::Tar => "tar",
            ArchiveType::GzTar => "gztar",
            ArchiveType::BzTar => "bztar",
            ArchiveType::XzTar => "xztar",
            ArchiveType::NoArchive => "noarchive",
        }
    }
}

impl FromStr for ArchiveType {
    type Err = BackupError;

    /// 解析归档格式名称
    ///
    /// 未知名称返回 [`BackupError::UnsupportedArchiveType`]。
    /// 在任何复制动作开始之前解析配置即可满足"提前校验"的要求。
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "zip" => Ok(ArchiveType::Zip),
            "tar" => Ok(ArchiveType::Tar),
            "gztar" => Ok(ArchiveType::GzTar),
            "bztar" => Ok(ArchiveType::BzTar),
            "xztar" => Ok(ArchiveType::XzTar),
            "noarchive" => Ok(ArchiveType::NoArchive),
            other => Err(BackupError::UnsupportedArchiveType(other.to_string())),
        }
    }
}

impl std::fmt::Display for ArchiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 把 `src_dir` 的内容打包为 `archive_path`
///
/// 目录内容位于归档的根部（不含 `src_dir` 本身这一层）。
///
/// # 参数
/// * `kind` - 归档格式（不能是 `NoArchive`）
/// * `src_dir` - 要打包的目录
/// * `archive_path` - 归档文件的输出路径
///
/// # 返回
/// * `Ok(())` - 打包完成
/// * `Err(anyhow::Error)` - 打包失败
pub fn make_archive(kind: ArchiveType, src_dir: &Path, archive_path: &Path) -> Result<()> {
    match kind {
        ArchiveType::Zip => write_zip(src_dir, archive_path),
        ArchiveType::Tar => {
            let file = File::create(archive_path)
                .with_context(|| format!("Failed to create archive {:?}", archive_path))?;
            let mut builder = tar::Builder::new(file);
            builder.append_dir_all(".", src_dir)?;
            builder.finish()?;
            Ok(())
        }
        ArchiveType::GzTar => {
            let file = File::create(archive_path)
                .with_context(|| format!("Failed to create archive {:?}", archive_path))?;
            let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(enc);
            builder.append_dir_all(".", src_dir)?;
            builder.into_inner()?.finish()?;
            Ok(())
        }
        ArchiveType::BzTar => {
            let file = File::create(archive_path)
                .with_context(|| format!("Failed to create archive {:?}", archive_path))?;
            let enc = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
            let mut builder = tar::Builder::new(enc);
            builder.append_dir_all(".", src_dir)?;
            builder.into_inner()?.finish()?;
            Ok(())
        }
        ArchiveType::XzTar => {
            let file = File::create(archive_path)
                .with_context(|| format!("Failed to create archive {:?}", archive_path))?;
            let enc = xz2::write::XzEncoder::new(file, 6);
            let mut builder = tar::Builder::new(enc);
            builder.append_dir_all(".", src_dir)?;
            builder.into_inner()?.finish()?;
            Ok(())
        }
        ArchiveType::NoArchive => bail!("noarchive has no archive writer"),
    }
}

/// 用 Deflate 压缩把目录内容写入 ZIP 文件
fn write_zip(src_dir: &Path, archive_path: &Path) -> Result<()> {
    let file = File::create(archive_path)
        .with_context(|| format!("Failed to create archive {:?}", archive_path))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in WalkDir::new(src_dir) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(src_dir)
            .expect("walkdir yields paths under its root");
        if rel.as_os_str().is_empty() {
            continue; // 根目录本身不写入
        }

        // ZIP 条目名称统一使用正斜杠
        let name = rel.to_string_lossy().replace('\\', "/");

        if entry.file_type().is_dir() {
            zip.add_directory(name, options)?;
        } else {
            zip.start_file(name, options)?;
            let mut src = File::open(entry.path())
                .with_context(|| format!("Failed to open {:?}", entry.path()))?;
            io::copy(&mut src, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn sample_tree(root: &Path) {
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), b"alpha").unwrap();
        fs::write(root.join("sub/b.txt"), b"beta").unwrap();
    }

    #[test]
    fn parses_known_names_and_rejects_unknown() {
        assert_eq!("zip".parse::<ArchiveType>().unwrap(), ArchiveType::Zip);
        assert_eq!("gztar".parse::<ArchiveType>().unwrap(), ArchiveType::GzTar);
        assert_eq!(
            "noarchive".parse::<ArchiveType>().unwrap(),
            ArchiveType::NoArchive
        );

        let err = "rar".parse::<ArchiveType>().unwrap_err();
        assert!(matches!(err, BackupError::UnsupportedArchiveType(_)));
    }

    #[test]
    fn extensions_match_formats() {
        assert_eq!(ArchiveType::Zip.extension(), Some("zip"));
        assert_eq!(ArchiveType::BzTar.extension(), Some("tar.bz2"));
        assert_eq!(ArchiveType::NoArchive.extension(), None);
    }

    #[test]
    fn zip_archive_contains_tree_contents() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        sample_tree(&src);

        let out = dir.path().join("out.zip");
        make_archive(ArchiveType::Zip, &src, &out).unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&out).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();
        assert!(names.contains(&"a.txt".to_string()));
        assert!(names.contains(&"sub/b.txt".to_string()));
    }

    #[test]
    fn gztar_archive_is_readable() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        sample_tree(&src);

        let out = dir.path().join("out.tar.gz");
        make_archive(ArchiveType::GzTar, &src, &out).unwrap();

        let reader = flate2::read::GzDecoder::new(File::open(&out).unwrap());
        let mut tar = tar::Archive::new(reader);
        let paths: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(paths.iter().any(|p| p.ends_with("a.txt")));
        assert!(paths.iter().any(|p| p.ends_with("sub/b.txt")));
    }

    #[test]
    fn noarchive_has_no_writer() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("src");
        sample_tree(&src);

        let out = dir.path().join("out.bin");
        assert!(make_archive(ArchiveType::NoArchive, &src, &out).is_err());
    }
}
