//! Audio batch assembly.
//!
//! Per-chapter audio artifacts are merged into one batch artifact.
//! The preferred path shells out to ffmpeg (found on PATH or configured
//! explicitly) and concatenates with the concat demuxer, preserving
//! timing and quality. When ffmpeg is unavailable the assembler falls
//! back to raw byte concatenation: for MP3 the result usually still
//! plays, but it is not a valid container and must not be relied on for
//! format correctness.
//!
//! Intermediates are deleted only after successful assembly; a failed
//! batch keeps them on disk so it can be recovered.

use crate::error::AssemblyError;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// A produced batch artifact. Immutable once written.
#[derive(Debug, Clone)]
pub struct AudioBatch {
    /// 1-based batch index within the job.
    pub index: u32,

    /// First chapter position in the batch (numbering by synthesis
    /// position, not source chapter number).
    pub first_chapter: u32,

    /// Last chapter position in the batch, inclusive.
    pub last_chapter: u32,

    /// Path of the merged artifact.
    pub path: PathBuf,

    /// Number of chapters merged in.
    pub chapters: u32,

    /// False when assembly failed; the intermediates are then still on
    /// disk next to the (missing or partial) artifact.
    pub assembled: bool,
}

/// Resolves the ffmpeg binary: an explicit configured path wins,
/// otherwise PATH is searched. `None` selects the raw-concat fallback.
pub fn find_ffmpeg(configured: Option<&str>) -> Option<PathBuf> {
    match configured {
        Some(path) => Some(PathBuf::from(path)),
        None => which::which("ffmpeg").ok(),
    }
}

/// Merges the ordered per-chapter artifacts into `dest` and deletes the
/// intermediates on success.
pub fn assemble_batch(
    parts: &[PathBuf],
    dest: &Path,
    ffmpeg: Option<&Path>,
) -> Result<(), AssemblyError> {
    if parts.is_empty() {
        return Err(AssemblyError::NoInput);
    }

    match ffmpeg {
        Some(binary) => concat_with_ffmpeg(binary, parts, dest)?,
        None => concat_raw(parts, dest)?,
    }

    for part in parts {
        fs::remove_file(part)?;
    }

    Ok(())
}

/// Escapes a path for an ffmpeg concat list entry.
fn concat_list_entry(path: &Path) -> String {
    let absolute = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let escaped = absolute.to_string_lossy().replace('\'', r"'\''");
    format!("file '{}'\n", escaped)
}

/// Audio-aware concatenation via the ffmpeg concat demuxer with stream
/// copy.
fn concat_with_ffmpeg(
    binary: &Path,
    parts: &[PathBuf],
    dest: &Path,
) -> Result<(), AssemblyError> {
    let list_path = dest.with_extension("ffconcat");
    let list: String = parts.iter().map(|p| concat_list_entry(p)).collect();
    fs::write(&list_path, list)?;

    let output = Command::new(binary)
        .arg("-y")
        .arg("-f")
        .arg("concat")
        .arg("-safe")
        .arg("0")
        .arg("-i")
        .arg(&list_path)
        .arg("-c")
        .arg("copy")
        .arg(dest)
        .output();

    let _ = fs::remove_file(&list_path);

    let output = output?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr
            .lines()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect::<Vec<_>>()
            .join("\n");
        return Err(AssemblyError::Ffmpeg(tail));
    }

    Ok(())
}

/// Degraded fallback: concatenates the raw artifact bytes in order.
/// The result is not a valid container, though MP3 players commonly
/// tolerate it.
fn concat_raw(parts: &[PathBuf], dest: &Path) -> Result<(), AssemblyError> {
    let mut out = fs::File::create(dest)?;
    for part in parts {
        let mut input = fs::File::open(part)?;
        io::copy(&mut input, &mut out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write_parts(dir: &Path, contents: &[&[u8]]) -> Vec<PathBuf> {
        contents
            .iter()
            .enumerate()
            .map(|(i, bytes)| {
                let path = dir.join(format!("chapter_{:04}.mp3", i + 1));
                fs::write(&path, bytes).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_raw_concat_merges_and_deletes_intermediates() {
        let dir = tempdir().unwrap();
        let parts = write_parts(dir.path(), &[b"one-", b"two-", b"three"]);
        let dest = dir.path().join("batch_1_chapters_1_to_3.mp3");

        assemble_batch(&parts, &dest, None).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"one-two-three");
        for part in &parts {
            assert!(!part.exists(), "intermediate {} should be deleted", part.display());
        }
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let dir = tempdir().unwrap();
        let dest = dir.path().join("batch.mp3");
        assert!(matches!(
            assemble_batch(&[], &dest, None),
            Err(AssemblyError::NoInput)
        ));
    }

    #[test]
    fn test_failed_assembly_keeps_intermediates() {
        let dir = tempdir().unwrap();
        let parts = write_parts(dir.path(), &[b"one", b"two"]);
        let dest = dir.path().join("missing-subdir").join("batch.mp3");

        assert!(assemble_batch(&parts, &dest, None).is_err());
        for part in &parts {
            assert!(part.exists(), "intermediate {} must survive failure", part.display());
        }
    }

    #[test]
    fn test_find_ffmpeg_prefers_configured_path() {
        let found = find_ffmpeg(Some("/opt/tools/ffmpeg"));
        assert_eq!(found, Some(PathBuf::from("/opt/tools/ffmpeg")));
    }

    #[test]
    fn test_concat_list_entry_escapes_quotes() {
        let entry = concat_list_entry(Path::new("/tmp/it's.mp3"));
        assert!(entry.starts_with("file '"));
        assert!(entry.contains(r"it'\''s.mp3"));
    }
}
