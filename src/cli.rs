use clap::Parser;
use std::path::PathBuf;

use crate::config::Config;
use crate::error::Result;
use crate::generate::{GenerationOptions, OptionValue};

/// Convert videos to articles using AI.
///
/// Options after `--` are passed to the model, e.g. `-- --temperature 0.7`.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Video URLs to process
    #[arg(required_unless_present = "dump_config")]
    pub video_urls: Vec<String>,

    /// Model name or local model path
    #[arg(short, long)]
    pub model: Option<String>,

    /// Output directory for results
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Overwrite cached step results
    #[arg(short = 'f', long)]
    pub overwrite: bool,

    /// Skip the critical review step
    #[arg(long)]
    pub skip_review: bool,

    /// Open the result HTML in the browser (default)
    #[arg(long, overrides_with = "no_open_browser")]
    pub open_browser: bool,

    /// Do not open the result HTML
    #[arg(long, overrides_with = "open_browser")]
    pub no_open_browser: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Write the effective configuration to a TOML file and exit
    #[arg(long, value_name = "PATH")]
    pub dump_config: Option<PathBuf>,

    /// Generation options forwarded to the model
    #[arg(last = true)]
    pub generation_args: Vec<String>,
}

impl Args {
    /// Apply command-line values over a loaded configuration
    pub fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(output_dir) = &self.output_dir {
            config.output_dir = output_dir.clone();
        }
        if self.overwrite {
            config.overwrite = true;
        }
        if self.skip_review {
            config.skip_review = true;
        }
        if self.open_browser {
            config.open_browser = true;
        }
        if self.no_open_browser {
            config.open_browser = false;
        }

        let overrides = GenerationOptions::from_pairs(parse_extra_args(&self.generation_args))?;
        config.generation = config.generation.merged_with(&overrides);
        Ok(())
    }
}

/// Parse `--key value`, `--key=value` and bare `--flag` tokens.
///
/// Dashes in keys become underscores and values are typed with
/// [`OptionValue::infer`]. Stray tokens are ignored.
pub fn parse_extra_args(args: &[String]) -> Vec<(String, OptionValue)> {
    let mut result = Vec::new();
    let mut i = 0;

    while i < args.len() {
        let Some(name) = args[i].strip_prefix("--") else {
            i += 1;
            continue;
        };

        if let Some((key, value)) = name.split_once('=') {
            result.push((key.replace('-', "_"), OptionValue::infer(value)));
            i += 1;
        } else if i + 1 < args.len() && !args[i + 1].starts_with("--") {
            result.push((name.replace('-', "_"), OptionValue::infer(&args[i + 1])));
            i += 2;
        } else {
            result.push((name.replace('-', "_"), OptionValue::Bool(true)));
            i += 1;
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_extra_args() {
        let parsed = parse_extra_args(&strings(&[
            "--temperature",
            "0.7",
            "--max-tokens=2048",
            "--stream",
            "stray",
            "--reasoning-effort",
            "high",
            "--logprobs",
        ]));

        assert_eq!(
            parsed,
            vec![
                ("temperature".to_string(), OptionValue::Float(0.7)),
                ("max_tokens".to_string(), OptionValue::Int(2048)),
                ("stream".to_string(), OptionValue::Bool(true)),
                ("reasoning_effort".to_string(), OptionValue::Str("high".to_string())),
                ("logprobs".to_string(), OptionValue::Bool(true)),
            ]
        );
    }

    #[test]
    fn test_negative_number_is_a_value() {
        let parsed = parse_extra_args(&strings(&["--max-tokens", "-1", "--seed=FALSE"]));
        assert_eq!(
            parsed,
            vec![
                ("max_tokens".to_string(), OptionValue::Int(-1)),
                ("seed".to_string(), OptionValue::Bool(false)),
            ]
        );
    }

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "v2a",
            "https://youtu.be/a",
            "https://youtu.be/b",
            "-m",
            "qwen.gguf",
            "--skip-review",
            "--no-open-browser",
            "--",
            "--temperature",
            "0.2",
            "--enable-thinking",
        ]);
        assert_eq!(args.video_urls.len(), 2);

        let mut config = Config::default();
        config.generation.temperature = Some(0.9);
        config.generation.top_p = Some(0.8);
        args.apply_to(&mut config).unwrap();

        assert_eq!(config.model, "qwen.gguf");
        assert!(config.skip_review);
        assert!(!config.open_browser);
        assert!(!config.overwrite);
        assert_eq!(config.generation.temperature, Some(0.2));
        assert_eq!(config.generation.top_p, Some(0.8));
        assert_eq!(
            config.generation.extra.get("enable_thinking"),
            Some(&OptionValue::Bool(true))
        );
    }

    #[test]
    fn test_urls_required() {
        assert!(Args::try_parse_from(["v2a"]).is_err());
        assert!(Args::try_parse_from(["v2a", "--dump-config", "v2a.toml"]).is_ok());
    }
}
