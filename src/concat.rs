//! Lossless joining of capture segments into one programme recording.
//!
//! The planner only sees the [`Concatenator`] capability. The production
//! implementation drives ffmpeg's concat demuxer with stream copy, so no
//! audio is re-encoded.

use crate::error::{ArchiveError, Result};
use log::debug;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub trait Concatenator {
    /// Join `inputs`, in the given order, into a new file at `destination`.
    /// On error nothing is left at `destination`.
    fn concatenate(&self, inputs: &[PathBuf], destination: &Path) -> Result<()>;
}

impl<F> Concatenator for F
where
    F: Fn(&[PathBuf], &Path) -> Result<()>,
{
    fn concatenate(&self, inputs: &[PathBuf], destination: &Path) -> Result<()> {
        self(inputs, destination)
    }
}

/// Build the ffmpeg argument list for a stream-copy concat of `manifest`.
pub fn build_concat_args(manifest: &Path, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    args.push("-hide_banner".into());
    args.push("-loglevel".into());
    args.push("error".into());
    args.push("-y".into());
    args.push("-f".into());
    args.push("concat".into());
    args.push("-safe".into());
    args.push("0".into());
    args.push("-i".into());
    args.push(manifest.to_string_lossy().into_owned());
    args.push("-c".into());
    args.push("copy".into());
    args.push(output.to_string_lossy().into_owned());
    args
}

/// One `file '...'` line of a concat demuxer manifest.
pub fn manifest_line(path: &Path) -> String {
    let quoted = path.to_string_lossy().replace('\'', r"'\''");
    format!("file '{quoted}'\n")
}

pub struct FfmpegConcatenator {
    binary: PathBuf,
}

impl FfmpegConcatenator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        FfmpegConcatenator {
            binary: binary.into(),
        }
    }
}

impl Default for FfmpegConcatenator {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Concatenator for FfmpegConcatenator {
    fn concatenate(&self, inputs: &[PathBuf], destination: &Path) -> Result<()> {
        let failed = |reason: String| ArchiveError::Concatenation {
            output: destination.to_path_buf(),
            reason,
        };
        if inputs.is_empty() {
            return Err(failed("no input segments".into()));
        }

        // Both temp files are deleted on drop unless the partial is persisted.
        let mut manifest = tempfile::Builder::new()
            .prefix("airtime-manifest-")
            .suffix(".txt")
            .tempfile()
            .map_err(|e| ArchiveError::io(std::env::temp_dir(), e))?;
        for input in inputs {
            let absolute = std::path::absolute(input).map_err(|e| ArchiveError::io(input, e))?;
            manifest
                .write_all(manifest_line(&absolute).as_bytes())
                .map_err(|e| ArchiveError::io(manifest.path(), e))?;
        }
        manifest
            .flush()
            .map_err(|e| ArchiveError::io(manifest.path(), e))?;

        let dir = destination
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let suffix = destination
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let partial = tempfile::Builder::new()
            .prefix(".airtime-partial-")
            .suffix(&suffix)
            .tempfile_in(dir)
            .map_err(|e| ArchiveError::io(dir, e))?;

        let args = build_concat_args(manifest.path(), partial.path());
        debug!("{} {}", self.binary.display(), args.join(" "));
        let status = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .status()
            .map_err(|e| failed(format!("failed to launch {}: {e}", self.binary.display())))?;
        if !status.success() {
            return Err(failed(format!(
                "{} exited with status {}",
                self.binary.display(),
                status.code().unwrap_or(-1)
            )));
        }

        partial
            .persist_noclobber(destination)
            .map_err(|e| failed(format!("cannot move recording into place: {}", e.error)))?;
        Ok(())
    }
}
