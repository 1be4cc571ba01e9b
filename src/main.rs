use std::{path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::ProgressStyle;
use tokio::io::AsyncWriteExt;
use ytmdl::{
    download::{NullDownloader, YtDlpDownloader},
    fetcher::{FsCache, FsCachePlaylistFetcher, PlaylistFetcher, YtDlpPlaylistFetcher},
    folder::ResetPolicy,
    metadata::Playlist,
    pipeline::{Pipeline, PipelineEvent, PipelineEvents, PipelineJob, PipelineReport},
    PlaylistId,
};

#[derive(Debug, Parser)]
struct Args {
    #[clap(subcommand)]
    subcmd: SubCmd,
}

#[derive(Debug, Parser)]
struct GroupCacheDir {
    /// Cache directory.
    ///
    /// Playlist listings are cached here for an hour.
    #[clap(long, env = "YTMDL_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Always fetch playlist listings, ignoring the cache.
    #[clap(long)]
    no_cache: bool,
}

#[derive(Debug, Parser)]
struct GroupYtDlp {
    /// Path to yt-dlp.
    ///
    /// yt-dlp also needs ffmpeg to be installed to extract the audio.
    #[clap(long, env = "YTMDL_YTDLP_PATH", default_value = "yt-dlp")]
    ytdlp_path: PathBuf,

    /// Audio quality passed to yt-dlp, either a bitrate like '192K' or a VBR level from 0 to 10.
    #[clap(long, env = "YTMDL_AUDIO_QUALITY", default_value = "192K")]
    audio_quality: String,
}

#[derive(Debug, Parser)]
struct GroupOutput {
    /// Output directory
    #[clap(long, env = "YTMDL_OUTPUT_DIR", default_value = "downloads")]
    output_dir: PathBuf,

    /// Delete the output directory and everything in it before downloading.
    ///
    /// Refuses to reset the working directory, the home directory or a filesystem root.
    #[clap(long)]
    reset: bool,
}

impl GroupOutput {
    fn reset_policy(&self) -> ResetPolicy {
        if self.reset {
            ResetPolicy::Reset
        } else {
            ResetPolicy::Keep
        }
    }
}

#[derive(Debug, Parser)]
enum SubCmd {
    Info(InfoArgs),
    Download(DownloadArgs),
    Postprocess(PostprocessArgs),
    Interactive(InteractiveArgs),
    ClearCache(ClearCacheArgs),
}

#[derive(Debug, Parser)]
struct PlaylistSelector {
    /// Playlist link or ID.
    ///
    /// Ex:
    ///     - https://music.youtube.com/playlist?list=PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf
    ///     - PLrAXtmErZgOeiKm4sgNOknGvNjby9efdf
    #[clap(verbatim_doc_comment)]
    playlist: String,
}

/// Show the track listing of a playlist.
#[derive(Debug, Parser)]
struct InfoArgs {
    #[clap(flatten)]
    group_cache: GroupCacheDir,

    #[clap(flatten)]
    group_ytdlp: GroupYtDlp,

    /// Print the listing as json.
    #[clap(long)]
    json: bool,

    #[clap(flatten)]
    playlist: PlaylistSelector,
}

/// Download a playlist as mp3 files named and tagged after each track.
#[derive(Debug, Parser)]
struct DownloadArgs {
    #[clap(flatten)]
    group_ytdlp: GroupYtDlp,

    #[clap(flatten)]
    group_output: GroupOutput,

    #[clap(flatten)]
    playlist: PlaylistSelector,
}

/// Rename, tag and clean up a directory that was already downloaded into.
#[derive(Debug, Parser)]
struct PostprocessArgs {
    #[clap(default_value = "downloads")]
    dir: PathBuf,
}

/// Paste playlist links, look at their tracks and download them.
#[derive(Debug, Parser)]
struct InteractiveArgs {
    #[clap(flatten)]
    group_cache: GroupCacheDir,

    #[clap(flatten)]
    group_ytdlp: GroupYtDlp,

    #[clap(flatten)]
    group_output: GroupOutput,
}

/// Delete every cached playlist listing.
#[derive(Debug, Parser)]
struct ClearCacheArgs {
    #[clap(flatten)]
    group_cache: GroupCacheDir,
}

async fn subcmd_info(args: InfoArgs) -> Result<()> {
    let id = helper_parse_playlist(&args.playlist)?;
    let fetcher = helper_get_fetcher(&args.group_cache, &args.group_ytdlp)?;
    let playlist = fetcher
        .get_playlist(&id)
        .await
        .context("fetching playlist")?;

    if args.json {
        let output = serde_json::to_vec_pretty(&playlist)?;
        tokio::io::stdout().write_all(&output).await?;
    } else {
        helper_print_playlist(&playlist);
    }

    Ok(())
}

async fn subcmd_download(args: DownloadArgs) -> Result<()> {
    let id = helper_parse_playlist(&args.playlist)?;
    let (pipeline, events) = helper_build_pipeline(&args.group_ytdlp);
    let handle = tokio::spawn(helper_pipeline_progress(events));

    let job = PipelineJob {
        playlist: id,
        output_dir: args.group_output.output_dir.clone(),
        reset: args.group_output.reset_policy(),
    };
    let result = pipeline.run(job).await;
    drop(pipeline);
    handle.await?;

    let report = result.context("downloading playlist")?;
    helper_print_report(&report);
    tracing::info!("download complete");

    Ok(())
}

async fn subcmd_postprocess(args: PostprocessArgs) -> Result<()> {
    let mut builder = Pipeline::builder();
    builder
        .with_downloader(NullDownloader)
        .with_default_stages();
    let (pipeline, events) = builder.build();
    let handle = tokio::spawn(helper_pipeline_progress(events));

    let result = pipeline.run_stages(&args.dir).await;
    drop(pipeline);
    handle.await?;

    let report = result.with_context(|| format!("post-processing {}", args.dir.display()))?;
    helper_print_report(&report);

    Ok(())
}

async fn subcmd_interactive(args: InteractiveArgs) -> Result<()> {
    let fetcher = helper_get_fetcher(&args.group_cache, &args.group_ytdlp)?;
    let (pipeline, mut events) = helper_build_pipeline(&args.group_ytdlp);
    // events are already logged by the pipeline
    let drain = tokio::spawn(async move { while events.recv().await.is_some() {} });
    let mut running = Vec::new();

    loop {
        let prompt = helper_prompt_text("Enter YouTube Music Playlist URL (empty to quit):");
        let link = match prompt.await? {
            Some(link) if !link.trim().is_empty() => link,
            _ => break,
        };

        let id = match ytmdl::id::parse(&link) {
            Ok(id) => id,
            Err(_) => {
                println!("Invalid YouTube Music Playlist URL.");
                continue;
            }
        };

        match fetcher.get_playlist(&id).await {
            Ok(playlist) => {
                helper_print_playlist(&playlist);
            }
            Err(err) => {
                println!("Error loading playlist: {}", err);
                continue;
            }
        }

        if !helper_prompt_confirm("Download playlist?").await? {
            continue;
        }

        let output_dir = args.group_output.output_dir.clone();
        if pipeline.locks().is_busy(&output_dir) {
            println!(
                "A download into {} is already running, wait for it to finish.",
                output_dir.display()
            );
            continue;
        }

        println!(
            "Starting download from {} to {}...",
            id.to_url(),
            output_dir.display()
        );
        let job = PipelineJob {
            playlist: id,
            output_dir,
            reset: args.group_output.reset_policy(),
        };
        let pipeline = pipeline.clone();
        running.push(tokio::spawn(async move {
            let url = job.playlist.to_url();
            match pipeline.run(job).await {
                Ok(report) => {
                    println!("Download completed for playlist from {}", url);
                    helper_print_report(&report);
                }
                Err(err) => println!("Error during download: {}", err),
            }
        }));
        running.retain(|handle| !handle.is_finished());
    }

    running.retain(|handle| !handle.is_finished());
    if !running.is_empty() {
        println!("Waiting for {} running download(s) to finish...", running.len());
    }
    for handle in running {
        handle.await?;
    }
    drop(pipeline);
    drain.await?;

    Ok(())
}

async fn subcmd_clear_cache(args: ClearCacheArgs) -> Result<()> {
    let dir = helper_get_playlists_dir(&args.group_cache)?;
    FsCache::new(dir.clone())
        .clear()
        .await
        .with_context(|| format!("clearing cache at {}", dir.display()))?;
    tracing::info!("cleared {}", dir.display());
    Ok(())
}

fn helper_parse_playlist(selector: &PlaylistSelector) -> Result<PlaylistId> {
    ytmdl::id::parse(&selector.playlist)
        .with_context(|| format!("invalid playlist link: '{}'", selector.playlist))
}

fn helper_build_pipeline(ytdlp: &GroupYtDlp) -> (Pipeline, PipelineEvents) {
    let mut builder = Pipeline::builder();
    builder
        .with_downloader(YtDlpDownloader::new(
            ytdlp.ytdlp_path.clone(),
            ytdlp.audio_quality.clone(),
        ))
        .with_default_stages();
    builder.build()
}

fn helper_get_fetcher(
    dir: &GroupCacheDir,
    ytdlp: &GroupYtDlp,
) -> Result<Box<dyn PlaylistFetcher>> {
    let fetcher = YtDlpPlaylistFetcher::new(ytdlp.ytdlp_path.clone());
    if dir.no_cache {
        return Ok(Box::new(fetcher));
    }
    Ok(Box::new(FsCachePlaylistFetcher::new(
        fetcher,
        helper_get_playlists_dir(dir)?,
    )))
}

fn helper_get_cache_dir(dir: &GroupCacheDir) -> Result<PathBuf> {
    match dir.cache_dir {
        Some(ref dir) => Ok(dir.clone()),
        None => {
            let home = std::env::var("HOME").context("getting $HOME")?;
            let dir = PathBuf::from(home).join(".cache/ytmdl");
            Ok(dir)
        }
    }
}

fn helper_get_playlists_dir(dir: &GroupCacheDir) -> Result<PathBuf> {
    let cache_dir = helper_get_cache_dir(dir)?;
    Ok(cache_dir.join("playlists"))
}

async fn helper_prompt_text(message: &'static str) -> Result<Option<String>> {
    let answer =
        tokio::task::spawn_blocking(move || inquire::Text::new(message).prompt_skippable()).await?;
    match answer {
        Ok(answer) => Ok(answer),
        Err(inquire::InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("reading playlist link"),
    }
}

async fn helper_prompt_confirm(message: &'static str) -> Result<bool> {
    let answer = tokio::task::spawn_blocking(move || {
        inquire::Confirm::new(message)
            .with_default(true)
            .prompt_skippable()
    })
    .await?;
    match answer {
        Ok(answer) => Ok(answer.unwrap_or(false)),
        Err(inquire::InquireError::OperationInterrupted) => Ok(false),
        Err(err) => Err(err).context("reading confirmation"),
    }
}

fn helper_print_playlist(playlist: &Playlist) {
    let mut table = comfy_table::Table::new();
    table.set_header(vec!["No.", "Song", "Artist", "Duration"]);
    for (idx, track) in playlist.tracks.iter().enumerate() {
        table.add_row(vec![
            (idx + 1).to_string(),
            track.title.clone(),
            track.artists_joined(),
            track.duration.clone(),
        ]);
    }
    println!("{table}");
    println!("Loaded playlist: {}", playlist.title);
}

fn helper_print_report(report: &PipelineReport) {
    if let Some(rename) = report.stage("rename") {
        println!(
            "{} renamed, {} without metadata, {} failed",
            rename.processed.len(),
            rename.skipped.len(),
            rename.failed.len()
        );
        for (path, reason) in rename.failed.iter() {
            println!("  {}: {}", path.display(), reason);
        }
    }
    if let Some(cleanup) = report.stage("cleanup") {
        if !cleanup.failed.is_empty() {
            println!("{} leftover files could not be deleted", cleanup.failed.len());
        }
    }
}

async fn helper_pipeline_progress(mut events: PipelineEvents) {
    let disable_progress = std::env::var_os("YTMDL_DISABLE_PROGRESS").is_some();
    if disable_progress {
        while events.recv().await.is_some() {}
        return;
    }

    let pb = indicatif::ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(200));
    match ProgressStyle::with_template("[{elapsed_precise}] {spinner} {pos}/{len} {msg}") {
        Ok(style) => pb.set_style(style),
        Err(err) => tracing::debug!("invalid progress template: {}", err),
    }

    while let Some(ev) = events.recv().await {
        match ev {
            PipelineEvent::DownloadStarted { playlist, .. } => {
                pb.set_message(format!("Downloading {}", playlist.to_url()));
                pb.set_length(1);
                pb.set_position(0);
            }
            PipelineEvent::DownloadFinished { playlist } => {
                pb.set_message(format!("Finished downloading {}", playlist));
                pb.set_position(1);
            }
            PipelineEvent::PostProcessStarted { stage_count } => {
                pb.set_message("Post-processing");
                pb.set_position(0);
                pb.set_length(stage_count as u64);
            }
            PipelineEvent::PostProcessProgress {
                stage,
                stage_idx,
                stage_count,
            } => {
                pb.set_message(format!("Post-processing ({stage})"));
                pb.set_position(stage_idx as u64);
                pb.set_length(stage_count as u64);
            }
            PipelineEvent::StageFinished { .. } => pb.inc(1),
            PipelineEvent::PostProcessFailed { stage } => {
                pb.set_message(format!("Failed to post-process ({stage})"));
            }
            PipelineEvent::PostProcessFinished => {
                pb.set_message("Finished post-processing");
            }
        }
    }
    pb.finish_and_clear();
}

#[tokio::main]
async fn main() -> Result<()> {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("warn,ytmdl=info"))
        .context("building log filter")?;
    tracing_subscriber::fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    match args.subcmd {
        SubCmd::Info(args) => subcmd_info(args).await?,
        SubCmd::Download(args) => subcmd_download(args).await?,
        SubCmd::Postprocess(args) => subcmd_postprocess(args).await?,
        SubCmd::Interactive(args) => subcmd_interactive(args).await?,
        SubCmd::ClearCache(args) => subcmd_clear_cache(args).await?,
    };

    Ok(())
}
