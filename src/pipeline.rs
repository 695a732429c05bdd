use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use crate::cache::{Step, StepCache};
use crate::config::Config;
use crate::download::{Downloader, VideoSource};
use crate::error::{ArticleError, Result};
use crate::generate::{ChatMessage, GenerationOptions, Generator};
use crate::render;
use crate::transcript::normalize_subtitles;

const ARTICLE_PROMPT: &str = include_str!("prompts/make_article.txt");
const REVIEW_PROMPT: &str = include_str!("prompts/review.txt");

/// Per-invocation switches for a pipeline
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub output_dir: PathBuf,
    pub overwrite: bool,
    pub skip_review: bool,
    pub open_browser: bool,
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            overwrite: config.overwrite,
            skip_review: config.skip_review,
            open_browser: config.open_browser,
        }
    }
}

/// Outcome of a multi-video invocation
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<(String, PathBuf)>,
    pub failed: Vec<(String, ArticleError)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Messages asking for an article from a video's title, transcript and description
pub fn article_messages(
    title: &str,
    transcript: &str,
    description: Option<&str>,
) -> Vec<ChatMessage> {
    let mut user = format!("Title: {}\n\nTranscript: {}", title, transcript);
    if let Some(description) = description {
        user.push_str(&format!("\n\nDescription: {}", description));
    }

    vec![ChatMessage::system(ARTICLE_PROMPT), ChatMessage::user(user)]
}

/// Messages asking for a critical review of `article`
pub fn review_messages(article: &str) -> Vec<ChatMessage> {
    vec![ChatMessage::system(REVIEW_PROMPT), ChatMessage::user(article)]
}

/// Video URL to rendered article: retrieve, normalize, generate, review, render
pub struct Pipeline {
    settings: RunSettings,
    generator: Box<dyn Generator>,
    downloader: Box<dyn Downloader>,
}

impl Pipeline {
    pub fn new(
        settings: RunSettings,
        generator: Box<dyn Generator>,
        downloader: Box<dyn Downloader>,
    ) -> Self {
        Self {
            settings,
            generator,
            downloader,
        }
    }

    /// Process URLs one at a time; a failed URL is reported and skipped
    pub async fn run_batch(&self, video_urls: &[String]) -> BatchReport {
        let mut report = BatchReport::default();

        for video_url in video_urls {
            match self.run(video_url).await {
                Ok(path) => {
                    info!("Successfully processed {} -> {}", video_url, path.display());
                    report.succeeded.push((video_url.clone(), path));
                }
                Err(e) => {
                    error!("Failed to process {}: {}", video_url, e);
                    report.failed.push((video_url.clone(), e));
                }
            }
        }

        report
    }

    /// Run every step for one video and return the rendered page's path
    pub async fn run(&self, video_url: &str) -> Result<PathBuf> {
        let source = self.retrieve(video_url).await?;
        info!("Processing \"{}\"", source.title);

        let cache = StepCache::new(&source.work_dir, self.settings.overwrite);

        let transcript = cache
            .run(Step::Transcript, || async {
                Ok(normalize_subtitles(&source.raw_subtitles))
            })
            .await?;

        let article = cache
            .run(Step::Article, || {
                let messages = article_messages(
                    &source.title,
                    &transcript,
                    source.description.as_deref(),
                );
                self.generate("Writing article", messages)
            })
            .await?;

        let review = if self.settings.skip_review {
            None
        } else {
            let review = cache
                .run(Step::Review, || {
                    self.generate("Reviewing article", review_messages(&article))
                })
                .await?;
            Some(review)
        };

        let document = render::assemble(&article, review.as_deref());
        let path = render::write_page(&source.work_dir, &source.title, &document).await?;

        if self.settings.open_browser {
            render::open_in_viewer(&path).await;
        }

        Ok(path)
    }

    async fn retrieve(&self, video_url: &str) -> Result<VideoSource> {
        info!("Downloading subtitles and description");
        self.downloader
            .fetch(video_url, &self.settings.output_dir)
            .await
            .map_err(|e| match e {
                ArticleError::Retrieval(_) | ArticleError::DependencyMissing { .. } => e,
                other => ArticleError::Retrieval(format!("{}: {}", video_url, other)),
            })
    }

    async fn generate(&self, label: &'static str, messages: Vec<ChatMessage>) -> Result<String> {
        let spinner = spinner(label);
        let result = self
            .generator
            .generate(&messages, &GenerationOptions::default())
            .await;
        spinner.finish_and_clear();
        result
    }
}

fn spinner(label: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb.set_message(label);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}
