use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use llama_helpers::PromptFormat;

#[derive(Parser)]
#[command(
    name = "llama-tokenize",
    version,
    about = "Print the llama.cpp tokenization of a prompt or chat"
)]
pub struct Cli {
    /// Path to a GGUF model file.
    #[arg(long, env = "LLAMA_MODEL")]
    pub model: PathBuf,

    /// Tokenizer config (JSON). Missing file = defaults.
    #[arg(long, env = "LLAMA_TOKENIZER_CONFIG")]
    pub config: Option<PathBuf>,

    /// GPU layers (-1 = all, 0 = CPU only).
    #[arg(long, default_value_t = 0)]
    pub n_gpu_layers: i32,

    /// Which handle the vocabulary is reached through.
    #[arg(long, value_enum, default_value_t = Via::Context)]
    pub via: Via,

    /// Also print the text piece of every token.
    #[arg(long)]
    pub pieces: bool,

    /// Emit JSON instead of plain text.
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Via {
    Model,
    Context,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Tokenize raw text exactly as given.
    Text(TextArgs),

    /// Format a chat file as a prompt and tokenize it.
    Chat(ChatArgs),
}

#[derive(Debug, clap::Args, Clone)]
pub struct TextArgs {
    pub text: String,

    /// Prepend the BOS token.
    #[arg(long)]
    pub add_bos: bool,

    /// Parse special tokens in the text.
    #[arg(long)]
    pub special: bool,
}

#[derive(Debug, clap::Args, Clone)]
pub struct ChatArgs {
    /// JSON array of `{"role": ..., "content": ...}` entries.
    pub file: PathBuf,

    /// Prompt layout; overrides `prompt_format` from the config.
    #[arg(long, value_enum)]
    pub format: Option<ChatFormat>,

    /// Decode the prompt once to check it fits the context.
    #[arg(long)]
    pub eval: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChatFormat {
    Llama2,
    Phi2,
}

impl From<ChatFormat> for PromptFormat {
    fn from(f: ChatFormat) -> Self {
        match f {
            ChatFormat::Llama2 => PromptFormat::Llama2,
            ChatFormat::Phi2 => PromptFormat::Phi2,
        }
    }
}
