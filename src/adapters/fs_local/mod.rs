// Local filesystem adapter - Input expansion with walkdir

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ProbeXError, ProbeXResult};
use crate::ports::FsPort;

/// Filesystem adapter for local paths
#[derive(Debug, Clone, Default)]
pub struct FsLocalAdapter {
    /// Follow symbolic links while walking directories
    follow_links: bool,
}

impl FsLocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_follow_links(mut self, follow_links: bool) -> Self {
        self.follow_links = follow_links;
        self
    }

    fn expand(&self, inputs: &[PathBuf]) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for input in inputs {
            if !input.is_dir() {
                // Missing files surface later as per-unit failures
                files.push(input.clone());
                continue;
            }
            let before = files.len();
            let walker = WalkDir::new(input)
                .follow_links(self.follow_links)
                .sort_by_file_name();
            for entry in walker {
                match entry {
                    Ok(entry) if entry.file_type().is_file() => files.push(entry.into_path()),
                    Ok(_) => {}
                    Err(error) => warn!(%error, "skipping unreadable directory entry"),
                }
            }
            debug!(dir = %input.display(), files = files.len() - before, "expanded directory");
        }
        files
    }
}

#[async_trait]
impl FsPort for FsLocalAdapter {
    async fn expand_inputs(&self, inputs: &[PathBuf]) -> ProbeXResult<Vec<PathBuf>> {
        let adapter = self.clone();
        let inputs = inputs.to_vec();
        tokio::task::spawn_blocking(move || adapter.expand(&inputs))
            .await
            .map_err(|e| ProbeXError::Worker {
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[tokio::test]
    async fn test_directories_expand_sorted() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("b.ts"), b"x").unwrap();
        fs::write(dir.path().join("a.mp4"), b"x").unwrap();
        fs::write(dir.path().join("sub").join("c.mkv"), b"x").unwrap();

        let loose = PathBuf::from("not-there.vob");
        let files = FsLocalAdapter::new()
            .expand_inputs(&[loose.clone(), dir.path().to_path_buf()])
            .await
            .unwrap();

        assert_eq!(
            files,
            vec![
                loose,
                dir.path().join("a.mp4"),
                dir.path().join("b.ts"),
                dir.path().join("sub").join("c.mkv"),
            ]
        );
    }
}
