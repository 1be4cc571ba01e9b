use std::path::Path;

use crate::metadata;

use super::{PipelineStage, StageReport};

/// Deletes sidecar documents and intermediate media left behind by the downloader.
#[derive(Debug, Default)]
pub struct CleanupStage;

impl CleanupStage {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl PipelineStage for CleanupStage {
    fn name(&self) -> &'static str {
        "cleanup"
    }

    async fn process(&self, work_dir: &Path) -> std::io::Result<StageReport> {
        let work_dir = work_dir.to_path_buf();
        tokio::task::spawn_blocking(move || clean_up(&work_dir))
            .await
            .map_err(|err| std::io::Error::other(err.to_string()))?
    }
}

fn is_leftover(name: &str) -> bool {
    name.ends_with(metadata::SIDECAR_SUFFIX) || name.ends_with(metadata::INTERMEDIATE_SUFFIX)
}

/// Delete every `*.info.json` and `*.webm` file in `dir`.
///
/// Each deletion is independent, failures are logged and recorded in the report.
pub fn clean_up(dir: &Path) -> std::io::Result<StageReport> {
    clean_up_with(dir, |path| std::fs::remove_file(path))
}

fn clean_up_with<R>(dir: &Path, remove: R) -> std::io::Result<StageReport>
where
    R: Fn(&Path) -> std::io::Result<()>,
{
    let mut report = StageReport::default();

    for entry in std::fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::error!("error reading entry of {}: {}", dir.display(), err);
                report.failed.push((dir.to_path_buf(), err.to_string()));
                continue;
            }
        };
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !is_leftover(&name) {
            continue;
        }

        let path = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => continue,
            Ok(_) => {}
            Err(err) => {
                tracing::error!("error inspecting {}: {}", name, err);
                report.failed.push((path, err.to_string()));
                continue;
            }
        }

        match remove(&path) {
            Ok(()) => {
                tracing::info!("deleted: {}", name);
                report.processed.push(path);
            }
            Err(err) => {
                tracing::error!("error deleting {}: {}", name, err);
                report.failed.push((path, err.to_string()));
            }
        }
    }

    report.processed.sort();
    report.failed.sort();
    Ok(report)
}
