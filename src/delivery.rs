// delivery.rs — Hand artifacts (auto-downloaded originals, exported workbooks) to the user's disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use crate::config;

/// Fire-and-forget delivery of an in-memory artifact.
pub trait ArtifactSink {
    fn deliver(&self, file_name: &str, bytes: &[u8]);
}

/// Writes into a download folder, never overwriting an existing file.
pub struct DownloadFolder {
    dir: PathBuf,
}

impl DownloadFolder {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Write and return the final path.
    pub fn write(&self, file_name: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create download dir {}", self.dir.display()))?;
        let target = free_path(&self.dir, &sanitize_file_name(file_name))?;
        let mut tmp = target.clone().into_os_string();
        tmp.push(".part");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, bytes).with_context(|| format!("failed writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &target)
            .with_context(|| format!("failed to rename {} -> {}", tmp.display(), target.display()))?;
        Ok(target)
    }
}

impl ArtifactSink for DownloadFolder {
    fn deliver(&self, file_name: &str, bytes: &[u8]) {
        match self.write(file_name, bytes) {
            Ok(p) => log::info!("Delivered {} ({} bytes) to {}", file_name, bytes.len(), p.display()),
            Err(e) => log::error!("Download failed for {}: {:?}", file_name, e),
        }
    }
}

/// Final path component only; falls back to a fixed name when nothing usable remains.
pub fn sanitize_file_name(name: &str) -> String {
    let last = name.rsplit(['/', '\\']).next().unwrap_or("").trim();
    if last.is_empty() || last == "." || last == ".." {
        return "download".to_string();
    }
    last.to_string()
}

/// `name`, then `stem (1).ext`, `stem (2).ext`, ... until one does not exist.
fn free_path(dir: &Path, name: &str) -> anyhow::Result<PathBuf> {
    let candidate = dir.join(name);
    if !candidate.exists() {
        return Ok(candidate);
    }
    let p = Path::new(name);
    let stem = p.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = p.extension().and_then(|s| s.to_str());
    for n in 1..=config::delivery::MAX_NAME_ATTEMPTS {
        let alt = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        let candidate = dir.join(alt);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    bail!("no free file name for {} in {}", name, dir.display());
}
