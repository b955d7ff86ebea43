use std::path::Path;

use anyhow::Context as _;
use llama_helpers::{
    ChatEntry, LlamaBackend, LlamaBatch, LlamaToken, PromptTokenizer, Tokenize, TokenizerConfig,
    detokenize_pairs, tokenize_with_context, tokenize_with_model,
};
use tracing::{info, warn};

use crate::cli::{ChatArgs, Cli, Commands, TextArgs, Via};
use crate::loader::{OwnedContext, OwnedModel};
use crate::report::TokenizeReport;

pub fn execute(args: &Cli) -> anyhow::Result<TokenizeReport> {
    let backend = LlamaBackend::init();
    backend.set_log_callback();

    let config = match &args.config {
        Some(path) => TokenizerConfig::load_or_default(path)?,
        None => TokenizerConfig::default(),
    };

    // A context needs the weights; tokenizing through the model does not.
    let needs_context =
        args.via == Via::Context || matches!(&args.command, Commands::Chat(c) if c.eval);
    let model = OwnedModel::load_from_file(&args.model, args.n_gpu_layers, !needs_context)?;
    let n_ctx_train = model.borrow()?.n_ctx_train();
    if i64::from(config.context.context_window_size) > i64::from(n_ctx_train) && n_ctx_train > 0 {
        warn!(
            context_window_size = config.context.context_window_size,
            n_ctx_train, "Context window is larger than the model was trained on"
        );
    }
    let mut ctx = if needs_context {
        Some(OwnedContext::new(&model, config.context.context_window_size)?)
    } else {
        None
    };

    let mut report = match &args.command {
        Commands::Text(text) => tokenize_text(args.via, &model, ctx.as_mut(), text)?,
        Commands::Chat(chat) => tokenize_chat(args.via, &model, ctx.as_mut(), config, chat)?,
    };

    if args.pieces {
        let vocab = model.borrow()?;
        let pairs = detokenize_pairs(&vocab, &report.tokens)?;
        report.pieces = Some(pairs.into_iter().map(|(_, piece)| piece).collect());
    }

    info!(n_tokens = report.n_tokens, "Tokenized");
    Ok(report)
}

fn tokenize_text(
    via: Via,
    model: &OwnedModel,
    ctx: Option<&mut OwnedContext<'_>>,
    args: &TextArgs,
) -> anyhow::Result<TokenizeReport> {
    let tokens = match (via, ctx) {
        (Via::Context, Some(ctx)) => {
            tokenize_with_context(&ctx.borrow()?, &args.text, args.add_bos, args.special)?
        }
        _ => tokenize_with_model(model.borrow()?, &args.text, args.add_bos, args.special)?,
    };
    Ok(TokenizeReport::new(tokens))
}

fn tokenize_chat(
    via: Via,
    model: &OwnedModel,
    mut ctx: Option<&mut OwnedContext<'_>>,
    mut config: TokenizerConfig,
    args: &ChatArgs,
) -> anyhow::Result<TokenizeReport> {
    if let Some(format) = args.format {
        config.tokenizer.prompt_format = format.into();
    }
    let chat = read_chat(&args.file)?;
    let pipeline = PromptTokenizer::new(config)?;

    let tokens = match (via, ctx.as_deref_mut()) {
        (Via::Context, Some(ctx)) => tokenize_through(&pipeline, &ctx.borrow()?, &chat)?,
        _ => tokenize_through(&pipeline, &model.borrow()?, &chat)?,
    };

    let mut report = TokenizeReport::new(tokens);
    if args.eval {
        let ctx = ctx.context("--eval needs a context")?;
        let mut handle = ctx.borrow()?;
        let mut batch = LlamaBatch::new(report.tokens.len())?;
        batch.add_sequence(&report.tokens, 0)?;
        batch.decode(&mut handle)?;
        report.n_ctx = Some(handle.n_ctx());
    }
    Ok(report)
}

fn tokenize_through<T: Tokenize>(
    pipeline: &PromptTokenizer,
    tokenizer: &T,
    chat: &[ChatEntry],
) -> anyhow::Result<Vec<LlamaToken>> {
    Ok(pipeline.tokenize_chat(tokenizer, chat)?)
}

fn read_chat(path: &Path) -> anyhow::Result<Vec<ChatEntry>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("reading chat file {}", path.display()))?;
    let chat = serde_json::from_str(&data)
        .with_context(|| format!("parsing chat file {}", path.display()))?;
    Ok(chat)
}
