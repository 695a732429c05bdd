//! video2article - Turn online videos into readable articles
//!
//! Subtitles and the description are retrieved with yt-dlp, cleaned into a
//! transcript, rewritten as an article by a language model (remote
//! OpenAI-compatible API or a local model), optionally reviewed, and rendered
//! to a standalone HTML page. Every intermediate step is cached on disk.

pub mod cache;
pub mod cli;
pub mod command;
pub mod config;
pub mod download;
pub mod error;
pub mod generate;
pub mod pipeline;
pub mod render;
pub mod transcript;
