use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use tracing::{debug, info};

use crate::command::ToolCommand;
use crate::config::DownloadConfig;
use crate::error::{ArticleError, Result};

/// yt-dlp writes `<channel> -- <subtitle path>` here once the video is done
pub const TRACKER_FILENAME: &str = ".v2afiletracker";

const TRACKER_TEMPLATE: &str = "%(channel)s -- %(requested_subtitles.:.filepath)l";

/// Characters that behave like trailing space but survive `trim`
const INVISIBLE: [char; 4] = ['\u{200b}', '\u{200c}', '\u{200d}', '\u{feff}'];

const FULLWIDTH_PUNCT: [(char, char); 13] = [
    ('！', '!'),
    ('＂', '"'),
    ('＇', '\''),
    ('（', '('),
    ('）', ')'),
    ('，', ','),
    ('－', '-'),
    ('．', '.'),
    ('：', ':'),
    ('；', ';'),
    ('？', '?'),
    ('［', '['),
    ('］', ']'),
];

static VIDEO_ID_BRACKETS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[.*?\]\s*").expect("bracket pattern is valid"));

static LANGUAGE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.[a-z]{2}(\.srt)?$").expect("language pattern is valid"));

static NON_SLUG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("slug pattern is valid"));

/// Everything the pipeline needs from one retrieved video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoSource {
    pub raw_subtitles: String,
    pub description: Option<String>,
    pub title: String,
    pub work_dir: PathBuf,
}

/// Retrieves subtitles and metadata for a video URL
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn fetch(&self, video_url: &str, output_dir: &Path) -> Result<VideoSource>;
}

/// Downloader backed by the yt-dlp command-line tool
pub struct YtDlpDownloader {
    config: DownloadConfig,
}

impl YtDlpDownloader {
    pub fn new(config: DownloadConfig) -> Self {
        Self { config }
    }

    fn build_command(
        &self,
        video_url: &str,
        output_dir: &Path,
        tracker_path: &Path,
    ) -> ToolCommand {
        ToolCommand::new(&self.config.binary_path, "Subtitle download")
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .arg("--write-description")
            .option("--sub-langs", self.config.subtitle_langs.join(","))
            .option("--sub-format", "srt/best")
            .option("--convert-subs", "srt")
            .option("--paths", format!("home:{}", output_dir.display()))
            .arg("--print-to-file")
            .arg(format!("after_video:{}", TRACKER_TEMPLATE))
            .path(tracker_path)
            .arg("--quiet")
            .arg(video_url)
    }
}

#[async_trait]
impl Downloader for YtDlpDownloader {
    async fn fetch(&self, video_url: &str, output_dir: &Path) -> Result<VideoSource> {
        fs::create_dir_all(output_dir).await?;
        let output_dir = std::path::absolute(output_dir)?;
        let tracker_path = output_dir.join(TRACKER_FILENAME);

        info!("Downloading subtitles and description for {}", video_url);
        self.build_command(video_url, &output_dir, &tracker_path)
            .execute(ArticleError::Retrieval)
            .await?;

        organize_download(&output_dir, &tracker_path).await
    }
}

/// Move yt-dlp output into `output_dir/<channel>/<slug>/` and load it.
///
/// The tracker file is consumed.
pub async fn organize_download(output_dir: &Path, tracker_path: &Path) -> Result<VideoSource> {
    let content = match fs::read_to_string(tracker_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ArticleError::Retrieval(
                "No subtitle file was reported; the video may have no subtitles".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };
    fs::remove_file(tracker_path).await?;

    let content = content.trim();
    if content.is_empty() {
        return Err(ArticleError::Retrieval(format!(
            "Tracker file {} is empty",
            tracker_path.display()
        )));
    }

    let (channel, subtitle_path) = content.split_once(" -- ").ok_or_else(|| {
        ArticleError::Retrieval(format!("Unexpected tracker content: {}", content))
    })?;
    let subtitle_file = PathBuf::from(subtitle_path.trim());
    if !subtitle_file.is_file() {
        return Err(ArticleError::Retrieval(format!(
            "Subtitle file not found: {}",
            subtitle_file.display()
        )));
    }

    let raw_subtitles = fs::read_to_string(&subtitle_file).await?;
    if raw_subtitles.trim().is_empty() {
        return Err(ArticleError::Retrieval(format!(
            "Subtitle file is empty: {}",
            subtitle_file.display()
        )));
    }

    let stem = subtitle_file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let title = clean_video_title(&stem);
    let work_dir = output_dir.join(channel.trim()).join(slugify(&title));
    fs::create_dir_all(&work_dir).await?;
    debug!("Working directory: {}", work_dir.display());

    let description = match find_description(&subtitle_file, &stem) {
        Some(source) => {
            let target = work_dir.join("description.txt");
            fs::rename(&source, &target).await?;
            Some(fs::read_to_string(&target).await?)
        }
        None => None,
    };

    fs::rename(&subtitle_file, work_dir.join("raw.srt")).await?;

    Ok(VideoSource {
        raw_subtitles,
        description,
        title,
        work_dir,
    })
}

/// yt-dlp names the description after the video, without the subtitle language
fn find_description(subtitle_file: &Path, stem: &str) -> Option<PathBuf> {
    let parent = subtitle_file.parent()?;
    let without_language = LANGUAGE_SUFFIX.replace(stem, "");

    [stem.to_string(), without_language.into_owned()]
        .into_iter()
        .map(|base| parent.join(format!("{}.description", base)))
        .find(|path| path.is_file())
}

/// Display title from a subtitle file stem such as `Title [dQw4w9WgXcQ].en`
pub fn clean_video_title(stem: &str) -> String {
    let without_id = VIDEO_ID_BRACKETS.replace_all(stem, "");
    let without_language = LANGUAGE_SUFFIX.replace(&without_id, "");

    without_language
        .trim()
        .trim_matches(|c| INVISIBLE.contains(&c))
        .chars()
        .map(|c| {
            FULLWIDTH_PUNCT
                .iter()
                .find(|(wide, _)| *wide == c)
                .map(|(_, ascii)| *ascii)
                .unwrap_or(c)
        })
        .collect()
}

/// Directory name for a title: `Kittens are 99% cute` becomes `kittens_are_99_cute`
pub fn slugify(title: &str) -> String {
    let lowered = title.trim().to_lowercase();
    let slug = NON_SLUG.replace_all(&lowered, "_");
    let slug = slug.trim_matches('_');

    if slug.is_empty() {
        "video".to_string()
    } else {
        slug.to_string()
    }
}
