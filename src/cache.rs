use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;

use tokio::fs;
use tracing::{debug, info};

use crate::error::{ArticleError, Result};

/// Cacheable pipeline steps. The name doubles as the cache file stem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Transcript,
    Article,
    Review,
}

impl Step {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Transcript => "transcript",
            Self::Article => "article",
            Self::Review => "review",
        }
    }
}

/// File-backed memoization of step results inside one working directory.
///
/// The key is only (directory, step name): inputs are not hashed, so a step
/// re-run with different inputs returns the stored text unless `overwrite`
/// is set.
#[derive(Debug, Clone)]
pub struct StepCache {
    dir: PathBuf,
    overwrite: bool,
}

impl StepCache {
    pub fn new<P: Into<PathBuf>>(dir: P, overwrite: bool) -> Self {
        Self {
            dir: dir.into(),
            overwrite,
        }
    }

    pub fn path_for(&self, step: Step) -> PathBuf {
        self.dir.join(format!("{}.md", step.name()))
    }

    /// Stored text for `step`, if any
    pub async fn load(&self, step: Step) -> Result<Option<String>> {
        let path = self.path_for(step);

        match fs::metadata(&path).await {
            Ok(meta) if !meta.is_file() => {
                return Err(ArticleError::CacheCorrupted {
                    path,
                    reason: "not a regular file".to_string(),
                });
            }
            Ok(_) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ArticleError::CacheCorrupted {
                    path,
                    reason: e.to_string(),
                });
            }
        }

        fs::read_to_string(&path)
            .await
            .map(Some)
            .map_err(|e| ArticleError::CacheCorrupted {
                path,
                reason: e.to_string(),
            })
    }

    /// Persist `text` for `step`, replacing any earlier value
    pub async fn store(&self, step: Step, text: &str) -> Result<()> {
        let path = self.path_for(step);
        debug!("Writing {} bytes to {}", text.len(), path.display());
        fs::write(&path, text).await?;
        Ok(())
    }

    /// Return the cached result of `step`, or run `compute` and cache what it returns.
    ///
    /// A hit performs no write and never calls `compute`; a miss (or
    /// `overwrite`) calls it once and writes once. Errors from `compute` are
    /// not cached.
    pub async fn run<F, Fut>(&self, step: Step, compute: F) -> Result<String>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        if !self.overwrite {
            if let Some(text) = self.load(step).await? {
                info!("Reading {} from cache", step.name());
                return Ok(text);
            }
        }

        info!("Making {}", step.name());
        let text = compute().await?;
        self.store(step, &text).await?;
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn counted(calls: &AtomicUsize, text: &str) -> Result<String> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(text.to_string())
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StepCache::new(dir.path(), false);
        let calls = AtomicUsize::new(0);

        let first = cache.run(Step::Article, || counted(&calls, "draft one")).await.unwrap();
        assert_eq!(first, "draft one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("article.md")).unwrap(),
            "draft one"
        );

        let second = cache.run(Step::Article, || counted(&calls, "draft two")).await.unwrap();
        assert_eq!(second, "draft one");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_overwrite_always_recomputes() {
        let dir = tempfile::tempdir().unwrap();
        let calls = AtomicUsize::new(0);

        StepCache::new(dir.path(), false)
            .run(Step::Review, || counted(&calls, "old"))
            .await
            .unwrap();

        let cache = StepCache::new(dir.path(), true);
        let text = cache.run(Step::Review, || counted(&calls, "new")).await.unwrap();
        assert_eq!(text, "new");
        let text = cache.run(Step::Review, || counted(&calls, "newer")).await.unwrap();
        assert_eq!(text, "newer");

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("review.md")).unwrap(),
            "newer"
        );
    }

    #[tokio::test]
    async fn test_steps_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StepCache::new(dir.path(), false);
        let calls = AtomicUsize::new(0);

        cache.run(Step::Transcript, || counted(&calls, "words")).await.unwrap();
        let article = cache.run(Step::Article, || counted(&calls, "prose")).await.unwrap();

        assert_eq!(article, "prose");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_step_is_not_cached() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StepCache::new(dir.path(), false);

        let result = cache
            .run(Step::Article, || async {
                Err(ArticleError::Generation("rate limited".to_string()))
            })
            .await;

        assert!(matches!(result, Err(ArticleError::Generation(_))));
        assert!(!cache.path_for(Step::Article).exists());
    }

    #[tokio::test]
    async fn test_unreadable_entry_is_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StepCache::new(dir.path(), false);
        std::fs::write(cache.path_for(Step::Article), [0xff, 0xfe, 0x00, 0xc3]).unwrap();
        std::fs::create_dir(cache.path_for(Step::Review)).unwrap();

        let calls = AtomicUsize::new(0);
        let article = cache.run(Step::Article, || counted(&calls, "unused")).await;
        let review = cache.run(Step::Review, || counted(&calls, "unused")).await;

        assert!(matches!(article, Err(ArticleError::CacheCorrupted { .. })));
        assert!(matches!(review, Err(ArticleError::CacheCorrupted { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
