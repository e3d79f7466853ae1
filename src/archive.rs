//! Directory archiving for downloads / 目录打包下载
//!
//! - `check_size`: breadth-first size probe with early exit / 广度优先统计大小，超限立即返回
//! - `build_archive`: writes a zip preserving paths relative to the source / 打包为zip，保留相对路径
//! - Temporary archives get unique names and stale ones are purged at startup

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufWriter, Seek, Write};
use std::path::{Path, PathBuf};

/// Archive extension / 压缩包后缀
pub const ARCHIVE_EXT: &str = "zip";

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("path does not exist: {0}")]
    NotFound(PathBuf),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Outcome of a size probe / 目录大小统计结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeReport {
    /// Bytes counted before the probe stopped / 已统计字节数
    pub total_bytes: u64,
    /// Regular files looked at / 已检查的文件数
    pub files_scanned: u64,
    /// Whether the cap was exceeded (probe stopped early) / 是否超限
    pub exceeded: bool,
}

/// Measure `path` against `max_bytes` / 统计目录大小
///
/// Uses an explicit queue instead of recursion. Entries of a directory are
/// visited in name order. The root is resolved like `build_archive` resolves
/// it, so a link to a directory is measured; links below the root are skipped.
pub fn probe_size(path: &Path, max_bytes: u64) -> io::Result<SizeReport> {
    let mut report = SizeReport { total_bytes: 0, files_scanned: 0, exceeded: false };
    let mut queue: VecDeque<PathBuf> = VecDeque::new();

    let meta = fs::metadata(path)?;
    if meta.is_file() {
        add_file(&mut report, meta.len(), max_bytes);
        return Ok(report);
    }
    if meta.is_dir() {
        queue.push_back(path.to_path_buf());
    }

    while let Some(dir) = queue.pop_front() {
        for entry in sorted_entries(&dir)? {
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                queue.push_back(entry.path());
            } else if file_type.is_file() {
                if add_file(&mut report, entry.metadata()?.len(), max_bytes) {
                    return Ok(report);
                }
            }
        }
    }
    Ok(report)
}

fn add_file(report: &mut SizeReport, len: u64, max_bytes: u64) -> bool {
    report.files_scanned += 1;
    report.total_bytes = report.total_bytes.saturating_add(len);
    report.exceeded = report.total_bytes > max_bytes;
    report.exceeded
}

/// `true` if everything under `path` fits in `max_bytes` / 目录大小是否未超过上限
pub fn check_size(path: &Path, max_bytes: u64) -> io::Result<bool> {
    Ok(!probe_size(path, max_bytes)?.exceeded)
}

/// Summary of a written archive / 压缩包信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: u64,
    pub directories: u64,
    pub source_bytes: u64,
}

/// Zip `source_dir` into `destination` / 将目录压缩到目标文件
///
/// Entry names are relative to `source_dir` and use `/`. Every directory,
/// empty or not, gets its own entry. Symlinks are skipped.
pub fn build_archive(source_dir: &Path, destination: &Path) -> Result<ArchiveSummary, ArchiveError> {
    if !source_dir.exists() {
        return Err(ArchiveError::NotFound(source_dir.to_path_buf()));
    }
    if !source_dir.is_dir() {
        return Err(ArchiveError::NotADirectory(source_dir.to_path_buf()));
    }

    let file = File::create(destination)?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let mut summary = ArchiveSummary { files: 0, directories: 0, source_bytes: 0 };

    add_dir_to_zip(&mut zip, source_dir, "", &mut summary)?;
    let mut writer = zip.finish()?;
    writer.flush()?;

    tracing::debug!(
        "Archived {:?} -> {:?}: {} files, {} directories, {} bytes",
        source_dir, destination, summary.files, summary.directories, summary.source_bytes
    );
    Ok(summary)
}

fn add_dir_to_zip<W: Write + Seek>(
    zip: &mut zip::ZipWriter<W>,
    dir_path: &Path,
    prefix: &str,
    summary: &mut ArchiveSummary,
) -> Result<(), ArchiveError> {
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for entry in sorted_entries(dir_path)? {
        let file_type = entry.file_type()?;
        let name = entry.file_name();
        let full_name = if prefix.is_empty() {
            name.to_string_lossy().into_owned()
        } else {
            format!("{}/{}", prefix, name.to_string_lossy())
        };

        if file_type.is_dir() {
            zip.add_directory(full_name.as_str(), options)?;
            summary.directories += 1;
            add_dir_to_zip(zip, &entry.path(), &full_name, summary)?;
        } else if file_type.is_file() {
            let len = entry.metadata()?.len();
            zip.start_file(full_name.as_str(), options.large_file(len >= u32::MAX as u64))?;
            let mut file = File::open(entry.path())?;
            io::copy(&mut file, zip)?;
            summary.files += 1;
            summary.source_bytes += len;
        }
    }
    Ok(())
}

fn sorted_entries(dir: &Path) -> io::Result<Vec<fs::DirEntry>> {
    let mut entries = fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// Unique destination for an archive of `source_dir` / 生成唯一的临时压缩包路径
pub fn unique_archive_path(temp_dir: &Path, source_dir: &Path) -> PathBuf {
    let stem = archive_display_stem(source_dir);
    temp_dir.join(format!("{}-{}.{}", stem, uuid::Uuid::new_v4().simple(), ARCHIVE_EXT))
}

/// Name offered to the browser, e.g. `photos.zip` / 下载文件名
pub fn archive_download_name(source_dir: &Path) -> String {
    format!("{}.{}", archive_display_stem(source_dir), ARCHIVE_EXT)
}

fn archive_display_stem(source_dir: &Path) -> String {
    source_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "archive".to_string())
}

/// Delete archives left behind by a previous run / 清理上次运行遗留的临时压缩包
pub fn purge_stale_archives(temp_dir: &Path) -> io::Result<usize> {
    if !temp_dir.exists() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(temp_dir)? {
        let path = entry?.path();
        let is_archive = path.extension().map(|e| e == ARCHIVE_EXT).unwrap_or(false);
        if is_archive && path.is_file() {
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to remove stale archive {:?}: {}", path, e),
            }
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn write_bytes(path: &Path, len: usize) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, vec![b'x'; len]).unwrap();
    }

    #[test]
    fn test_check_size_boundary() {
        let dir = tempfile::tempdir().unwrap();
        write_bytes(&dir.path().join("a.txt"), 60);
        write_bytes(&dir.path().join("nested/deeper/b.txt"), 40);

        assert!(check_size(dir.path(), 100).unwrap());
        assert!(!check_size(dir.path(), 99).unwrap());
    }

    #[test]
    fn test_probe_stops_at_first_oversized_file() {
        let dir = tempfile::tempdir().unwrap();
        let huge = File::create(dir.path().join("a-huge.bin")).unwrap();
        huge.set_len(200 * 1024 * 1024).unwrap();
        for name in ["b.txt", "c.txt", "d.txt"] {
            write_bytes(&dir.path().join(name), 1);
        }

        let report = probe_size(dir.path(), 100 * 1024 * 1024).unwrap();
        assert!(report.exceeded);
        assert_eq!(report.files_scanned, 1);
    }

    #[test]
    fn test_probe_single_file_and_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("one.txt");
        write_bytes(&file, 10);
        assert!(check_size(&file, 10).unwrap());
        assert!(!check_size(&file, 9).unwrap());
        assert!(probe_size(&dir.path().join("missing"), 10).is_err());
    }

    #[test]
    fn test_build_archive_preserves_layout() {
        let src = tempfile::tempdir().unwrap();
        write_bytes(&src.path().join("top.txt"), 3);
        write_bytes(&src.path().join("sub/inner.txt"), 5);
        fs::create_dir_all(src.path().join("empty")).unwrap();

        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("out.zip");
        let summary = build_archive(src.path(), &dest).unwrap();
        assert_eq!(summary, ArchiveSummary { files: 2, directories: 2, source_bytes: 8 });

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut names: Vec<_> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["empty/", "sub/", "sub/inner.txt", "top.txt"]);

        let mut content = String::new();
        archive.by_name("sub/inner.txt").unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "xxxxx");
        assert_eq!(archive.by_name("empty/").unwrap().size(), 0);
    }

    #[test]
    fn test_build_archive_rejects_bad_source() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("plain.txt");
        write_bytes(&file, 1);
        let dest = dir.path().join("out.zip");

        assert!(matches!(build_archive(&dir.path().join("nope"), &dest), Err(ArchiveError::NotFound(_))));
        assert!(matches!(build_archive(&file, &dest), Err(ArchiveError::NotADirectory(_))));
    }

    #[cfg(unix)]
    #[test]
    fn test_probe_follows_linked_root() {
        let dir = tempfile::tempdir().unwrap();
        write_bytes(&dir.path().join("real/data.bin"), 1000);
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(dir.path().join("real"), &link).unwrap();

        let report = probe_size(&link, 10).unwrap();
        assert!(report.exceeded);
        assert_eq!(report.files_scanned, 1);
        assert!(!check_size(&link, 10).unwrap());
        assert!(check_size(&link, 1000).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_nested_links_are_skipped() {
        let outside = tempfile::tempdir().unwrap();
        write_bytes(&outside.path().join("big.bin"), 1000);
        let dir = tempfile::tempdir().unwrap();
        write_bytes(&dir.path().join("small.txt"), 5);
        std::os::unix::fs::symlink(outside.path(), dir.path().join("elsewhere")).unwrap();

        let report = probe_size(dir.path(), 10).unwrap();
        assert!(!report.exceeded);
        assert_eq!(report.total_bytes, 5);
    }

    #[test]
    fn test_archive_names() {
        let tmp = Path::new("/tmp/fer");
        let a = unique_archive_path(tmp, Path::new("/home/me/photos"));
        let b = unique_archive_path(tmp, Path::new("/home/me/photos"));
        assert_ne!(a, b);
        assert!(a.file_name().unwrap().to_string_lossy().starts_with("photos-"));
        assert_eq!(a.extension().unwrap(), "zip");
        assert_eq!(archive_download_name(Path::new("/home/me/photos")), "photos.zip");
        assert_eq!(archive_download_name(Path::new("/")), "archive.zip");
    }

    #[test]
    fn test_purge_stale_archives() {
        let dir = tempfile::tempdir().unwrap();
        write_bytes(&dir.path().join("old-1.zip"), 1);
        write_bytes(&dir.path().join("old-2.zip"), 1);
        write_bytes(&dir.path().join("keep.txt"), 1);

        assert_eq!(purge_stale_archives(dir.path()).unwrap(), 2);
        assert!(dir.path().join("keep.txt").exists());
        assert_eq!(purge_stale_archives(&dir.path().join("absent")).unwrap(), 0);
    }
}
