use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use thiserror::Error;

use crate::{
    download::{DownloadError, Downloader, NullDownloader},
    folder::{self, FolderError, ResetPolicy},
    lock::{DirectoryBusy, DirectoryLocks},
    PlaylistId,
};

mod stage_rename;
pub use stage_rename::{rename_and_tag, RenameStage, TrackError};

mod stage_cleanup;
pub use stage_cleanup::{clean_up, CleanupStage};

pub type PipelineEventSender = tokio::sync::mpsc::UnboundedSender<PipelineEvent>;
pub type PipelineEventReceiver = tokio::sync::mpsc::UnboundedReceiver<PipelineEvent>;
type PipelineStages = Vec<Arc<dyn PipelineStage>>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Busy(#[from] DirectoryBusy),
    #[error("failed to prepare output folder: {0}")]
    Folder(#[from] FolderError),
    #[error("download failed: {0}")]
    Download(#[from] DownloadError),
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    DownloadStarted {
        playlist: PlaylistId,
        output_dir: PathBuf,
    },
    DownloadFinished {
        playlist: PlaylistId,
    },
    PostProcessStarted {
        stage_count: usize,
    },
    PostProcessProgress {
        stage: String,
        stage_idx: usize,
        stage_count: usize,
    },
    StageFinished {
        stage: String,
        report: StageReport,
    },
    PostProcessFailed {
        stage: String,
    },
    PostProcessFinished,
}

/// Outcome of one stage over the target directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Files the stage acted on, by their final path.
    pub processed: Vec<PathBuf>,
    /// Files the stage left untouched.
    pub skipped: Vec<PathBuf>,
    /// Files the stage failed on, with the reason.
    pub failed: Vec<(PathBuf, String)>,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub stages: Vec<(&'static str, StageReport)>,
}

impl PipelineReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages
            .iter()
            .find(|(stage, _)| *stage == name)
            .map(|(_, report)| report)
    }
}

#[async_trait::async_trait]
pub trait PipelineStage: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn process(&self, work_dir: &Path) -> std::io::Result<StageReport>;
}

/// One fetch + post-process run.
#[derive(Debug, Clone)]
pub struct PipelineJob {
    pub playlist: PlaylistId,
    pub output_dir: PathBuf,
    pub reset: ResetPolicy,
}

#[derive(Debug)]
pub struct PipelineEvents {
    receiver: PipelineEventReceiver,
}

impl PipelineEvents {
    pub async fn recv(&mut self) -> Option<PipelineEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PipelineEvent> {
        self.receiver.try_recv().ok()
    }
}

#[derive(Default)]
pub struct PipelineBuilder {
    downloader: Option<Arc<dyn Downloader>>,
    stages: PipelineStages,
    locks: DirectoryLocks,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_downloader(&mut self, downloader: impl Downloader) -> &mut Self {
        self.downloader = Some(Arc::new(downloader));
        self
    }

    pub fn with_stage(&mut self, stage: impl PipelineStage) -> &mut Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Rename and tag, then clean up.
    pub fn with_default_stages(&mut self) -> &mut Self {
        self.with_stage(RenameStage).with_stage(CleanupStage)
    }

    pub fn with_locks(&mut self, locks: DirectoryLocks) -> &mut Self {
        self.locks = locks;
        self
    }

    pub fn build(self) -> (Pipeline, PipelineEvents) {
        let (event_tx, event_rx) = tokio::sync::mpsc::unbounded_channel();
        let downloader = self.downloader.unwrap_or_else(|| {
            tracing::warn!("No downloader provided to pipeline, only post-processing will run");
            Arc::new(NullDownloader)
        });
        (
            Pipeline {
                downloader,
                stages: self.stages,
                locks: self.locks,
                events: event_tx,
            },
            PipelineEvents { receiver: event_rx },
        )
    }
}

/// Runs jobs: prepare the folder, download, then every stage in order.
///
/// Clones share the downloader, stages and directory locks, so a run started from one clone
/// blocks runs on the same directory from every other clone.
#[derive(Clone)]
pub struct Pipeline {
    downloader: Arc<dyn Downloader>,
    stages: PipelineStages,
    locks: DirectoryLocks,
    events: PipelineEventSender,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("downloader", &self.downloader.name())
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn locks(&self) -> &DirectoryLocks {
        &self.locks
    }

    pub async fn run(&self, job: PipelineJob) -> Result<PipelineReport, PipelineError> {
        let _guard = self.locks.try_acquire(&job.output_dir)?;

        let output_dir = job.output_dir.clone();
        let reset = job.reset;
        tokio::task::spawn_blocking(move || folder::prepare(&output_dir, reset))
            .await
            .map_err(|err| FolderError::Io {
                path: job.output_dir.clone(),
                source: std::io::Error::other(err.to_string()),
            })??;

        self.evs(PipelineEvent::DownloadStarted {
            playlist: job.playlist.clone(),
            output_dir: job.output_dir.clone(),
        });
        self.downloader
            .download(&job.playlist, &job.output_dir)
            .await?;
        self.evs(PipelineEvent::DownloadFinished {
            playlist: job.playlist.clone(),
        });

        self.post_process(&job.output_dir).await
    }

    /// Run every stage over `dir` without downloading anything.
    pub async fn run_stages(&self, dir: &Path) -> Result<PipelineReport, PipelineError> {
        let _guard = self.locks.try_acquire(dir)?;
        self.post_process(dir).await
    }

    async fn post_process(&self, dir: &Path) -> Result<PipelineReport, PipelineError> {
        let stage_count = self.stages.len();
        self.evs(PipelineEvent::PostProcessStarted { stage_count });

        let mut report = PipelineReport::default();
        for (idx, stage) in self.stages.iter().enumerate() {
            tracing::debug!("starting stage '{}' for {}", stage.name(), dir.display());
            self.evs(PipelineEvent::PostProcessProgress {
                stage: stage.name().to_string(),
                stage_idx: idx,
                stage_count,
            });

            match stage.process(dir).await {
                Ok(stage_report) => {
                    self.evs(PipelineEvent::StageFinished {
                        stage: stage.name().to_string(),
                        report: stage_report.clone(),
                    });
                    report.stages.push((stage.name(), stage_report));
                }
                Err(err) => {
                    self.evs(PipelineEvent::PostProcessFailed {
                        stage: stage.name().to_string(),
                    });
                    return Err(PipelineError::Stage {
                        stage: stage.name(),
                        source: err,
                    });
                }
            }
        }

        self.evs(PipelineEvent::PostProcessFinished);
        Ok(report)
    }

    fn evs(&self, ev: PipelineEvent) {
        match &ev {
            PipelineEvent::DownloadStarted {
                playlist,
                output_dir,
            } => tracing::info!("Downloading {} to {}", playlist, output_dir.display()),
            PipelineEvent::DownloadFinished { playlist } => {
                tracing::info!("Finished downloading {}", playlist)
            }
            PipelineEvent::PostProcessStarted { stage_count } => {
                tracing::info!("Postprocessing ({} stages)", stage_count)
            }
            PipelineEvent::StageFinished { stage, report } => tracing::info!(
                "Stage '{}' processed {}, skipped {}, failed {}",
                stage,
                report.processed.len(),
                report.skipped.len(),
                report.failed.len()
            ),
            PipelineEvent::PostProcessFailed { stage } => {
                tracing::error!("Failed to postprocess at stage '{}'", stage)
            }
            PipelineEvent::PostProcessFinished => tracing::info!("Finished postprocessing"),
            _ => {}
        }
        if self.events.send(ev).is_err() {
            tracing::trace!("pipeline event receiver dropped");
        }
    }
}
