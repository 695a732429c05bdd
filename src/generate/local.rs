// Local inference through a llama.cpp style command-line runtime
//
// The runtime is an optional dependency: when its binary cannot be launched
// the backend refuses to load instead of failing on the first generate call.

use async_trait::async_trait;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::ToolCommand;
use crate::config::LocalConfig;
use crate::error::{ArticleError, Result};
use super::{ChatMessage, GenerationOptions, Generator, OptionValue};

const THINK_END: &str = "</think>";
const END_OF_TEXT: &str = "[end of text]";

/// Options consumed by the backend itself, never forwarded to the runtime
const ENABLE_THINKING: &str = "enable_thinking";
const VERBOSE: &str = "verbose";

/// Render messages with the ChatML template and open an assistant turn.
///
/// With thinking disabled an empty think block is pre-filled, which is how
/// hybrid reasoning models are told to answer directly.
pub fn apply_chat_template(messages: &[ChatMessage], enable_thinking: bool) -> String {
    let mut prompt = String::new();
    for message in messages {
        prompt.push_str(&format!(
            "<|im_start|>{}\n{}<|im_end|>\n",
            message.role.as_str(),
            message.content
        ));
    }
    prompt.push_str("<|im_start|>assistant\n");
    if !enable_thinking {
        prompt.push_str("<think>\n\n</think>\n\n");
    }
    prompt
}

/// Drop a leading reasoning segment, keeping what follows the first `</think>`
pub fn strip_thinking(response: &str) -> String {
    let response = response.trim();
    let response = response.strip_suffix(END_OF_TEXT).unwrap_or(response);
    match response.split_once(THINK_END) {
        Some((_, answer)) => answer.trim().to_string(),
        None => response.trim().to_string(),
    }
}

/// Backend running a model file with a local runtime
#[derive(Debug)]
pub struct LocalBackend {
    runtime: String,
    model_path: PathBuf,
    context_size: Option<u32>,
    defaults: GenerationOptions,
}

impl LocalBackend {
    /// Options every local generation starts from
    pub fn base_options() -> GenerationOptions {
        let mut options = GenerationOptions {
            max_tokens: Some(-1),
            ..Default::default()
        };
        options.extra.insert(VERBOSE.to_string(), OptionValue::Bool(false));
        options
    }

    /// Check the runtime and the model file once, up front
    pub async fn load<P: AsRef<Path>>(
        config: &LocalConfig,
        model_path: P,
        options: GenerationOptions,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        info!("Loading local model from {}", model_path.display());

        let probe = ToolCommand::new(&config.binary_path, "Local runtime probe").arg("--version");
        if !probe.is_available().await {
            return Err(ArticleError::DependencyMissing {
                dependency: config.binary_path.clone(),
                hint: "install llama.cpp or set [local].binary_path to use local models"
                    .to_string(),
            });
        }

        if !model_path.is_file() {
            return Err(ArticleError::Config(format!(
                "Model '{}' is not served by the remote provider and is not a local model file",
                model_path.display()
            )));
        }

        Ok(Self {
            runtime: config.binary_path.clone(),
            model_path: model_path.to_path_buf(),
            context_size: config.context_size,
            defaults: Self::base_options().merged_with(&options),
        })
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    fn build_command(&self, prompt_file: &Path, options: &GenerationOptions) -> ToolCommand {
        let mut command = ToolCommand::new(&self.runtime, "Local generation")
            .arg("-m")
            .path(&self.model_path)
            .arg("-f")
            .path(prompt_file)
            .arg("-no-cnv")
            .arg("--no-display-prompt");

        if let Some(context_size) = self.context_size {
            command = command.option("-c", context_size.to_string());
        }

        for (key, value) in options.to_map() {
            let flag = match key.as_str() {
                ENABLE_THINKING | VERBOSE => continue,
                "max_tokens" => "-n".to_string(),
                "temperature" => "--temp".to_string(),
                other => format!("--{}", other.replace('_', "-")),
            };
            command = match value {
                OptionValue::Bool(true) => command.arg(flag),
                OptionValue::Bool(false) => command,
                other => command.option(flag, other.to_string()),
            };
        }

        command
    }
}

#[async_trait]
impl Generator for LocalBackend {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        overrides: &GenerationOptions,
    ) -> Result<String> {
        let options = self.defaults.merged_with(overrides);
        let enable_thinking = matches!(
            options.extra.get(ENABLE_THINKING),
            Some(OptionValue::Bool(true))
        );
        let verbose = matches!(options.extra.get(VERBOSE), Some(OptionValue::Bool(true)));

        let prompt = apply_chat_template(messages, enable_thinking);
        let mut prompt_file = tempfile::NamedTempFile::new()?;
        prompt_file.write_all(prompt.as_bytes())?;
        prompt_file.flush()?;

        let command = self.build_command(prompt_file.path(), &options);
        debug!("Prompt is {} characters", prompt.len());

        let output = command.execute(ArticleError::Generation).await?;
        if verbose {
            info!("Runtime log:\n{}", output.stderr.trim());
        }

        let answer = strip_thinking(&output.stdout);
        if answer.is_empty() {
            return Err(ArticleError::Generation(
                "Local runtime produced no text".to_string(),
            ));
        }
        Ok(answer)
    }
}
