// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! viewer-chat - streaming chat about medical images from the terminal
//!
//! Entry point for the viewer-chat CLI. The terminal plays the part of the
//! imaging viewer: it renders controller snapshots, turns `/drop` into drop
//! payloads and registers `--viewport` images as rendering surfaces.

use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use viewer_chat::attachment::{DropPayload, DroppedFile, ImageSurface};
use viewer_chat::chat::{ChatController, SessionStatus};
use viewer_chat::cli::repl::{help_text, parse_input, ReplInput};
use viewer_chat::cli::{AskArgs, ChatArgs, Cli, Commands, ModelArgs, OutputFormat};
use viewer_chat::config::Settings;
use viewer_chat::llm::registry::{default_model, ProviderRegistry};

#[path = "main/output.rs"]
mod output;

use output::{models_json, print_models, TokenPrinter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "viewer_chat=trace"
        } else {
            "viewer_chat=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .init();

    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_from(&settings_path)
        .with_context(|| format!("Failed to load settings from {}", settings_path.display()))?;
    let registry = ProviderRegistry::new(settings);

    match cli.command {
        Some(Commands::Models) => run_models(&registry, cli.format).await,
        Some(Commands::Ask(args)) => run_ask(&registry, args, cli.format).await,
        Some(Commands::Chat(args)) => run_chat(&registry, args).await,
        None => run_chat(&registry, ChatArgs::default()).await,
    }
}

async fn run_models(registry: &ProviderRegistry, format: OutputFormat) -> anyhow::Result<()> {
    let providers = registry.discover().await;
    let default = default_model(&providers);
    let active = default.as_ref().map(|(p, m)| (*p, m.as_str()));

    match format {
        OutputFormat::Text => print_models(&providers, active),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&models_json(&providers, active))?),
    }
    Ok(())
}

async fn run_ask(registry: &ProviderRegistry, args: AskArgs, format: OutputFormat) -> anyhow::Result<()> {
    let controller = start_controller(registry, &args.model).await?;

    if let Some(path) = &args.image {
        drop_file(&controller, path)?;
    }
    if args.attach {
        controller.set_attachment_mode(true);
    }
    if format == OutputFormat::Text {
        controller.subscribe(TokenPrinter::default());
    }

    controller.submit(&args.prompt).finished().await;

    let conversation = controller.conversation();
    match format {
        OutputFormat::Text => println!(),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&conversation)?),
    }
    if conversation.status == SessionStatus::Error {
        bail!(conversation.last_error.unwrap_or_else(|| "request failed".to_string()));
    }
    Ok(())
}

async fn run_chat(registry: &ProviderRegistry, args: ChatArgs) -> anyhow::Result<()> {
    let controller = start_controller(registry, &args.model).await?;
    if args.attach {
        controller.set_attachment_mode(true);
    }
    controller.subscribe(TokenPrinter::default());

    if let Some(selection) = controller.selection() {
        println!("Chatting with {} ({}). /help for commands.", selection.model, selection.provider);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Help => println!("{}", help_text()),
            ReplInput::ListModels => {
                let selection = controller.selection();
                let active = selection.as_ref().map(|s| (s.provider, s.model.as_str()));
                print_models(&controller.providers(), active);
            }
            ReplInput::SelectModel { provider, model } => match controller.select_model(provider, &model) {
                Ok(()) => println!("Switched to {model} ({provider}); conversation cleared."),
                Err(e) => eprintln!("{e}"),
            },
            ReplInput::Attach(enabled) => {
                controller.set_attachment_mode(enabled);
                let staged = controller.snapshot().staged_attachment.is_some();
                println!(
                    "Attachment mode {}{}",
                    if enabled { "on" } else { "off" },
                    if enabled && staged { " (viewport staged)" } else { "" }
                );
            }
            ReplInput::Drop(path) => {
                if let Err(e) = drop_file(&controller, &path) {
                    eprintln!("{e:#}");
                }
            }
            ReplInput::Detach => {
                controller.remove_staged_attachment();
                println!("Attachment removed.");
            }
            ReplInput::Invalid(message) => eprintln!("{message}"),
            ReplInput::Prompt(text) => {
                controller.submit(&text).finished().await;
                println!();
                let conversation = controller.conversation();
                if conversation.status == SessionStatus::Error {
                    if let Some(error) = conversation.last_error {
                        eprintln!("{error}");
                    }
                }
            }
        }
    }
    Ok(())
}

/// Discover providers, register the viewport and apply any explicit model choice
async fn start_controller(registry: &ProviderRegistry, args: &ModelArgs) -> anyhow::Result<ChatController> {
    let controller = ChatController::from_registry(registry).await;

    if let Some(path) = &args.viewport {
        let surface = ImageSurface::open(path)
            .with_context(|| format!("Failed to open viewport image {}", path.display()))?;
        controller.surfaces().add(Arc::new(surface));
    }

    let providers = controller.providers();
    match (args.provider, &args.model) {
        (Some(provider), model) => {
            let model = match model {
                Some(model) => model.clone(),
                None => providers
                    .iter()
                    .find(|d| d.id == provider)
                    .and_then(|d| d.model_ids.first().cloned())
                    .with_context(|| format!("Provider {provider} is not available"))?,
            };
            controller.select_model(provider, &model)?;
        }
        (None, Some(model)) => {
            let provider = providers
                .iter()
                .find(|d| d.has_model(model))
                .map(|d| d.id)
                .with_context(|| format!("No provider offers model {model}"))?;
            controller.select_model(provider, model)?;
        }
        (None, None) => {}
    }

    if controller.selection().is_none() {
        bail!("No models available. Start an Ollama server or set GEMINI_API_KEY / DEEPSEEK_API_KEY.");
    }
    Ok(controller)
}

fn drop_file(controller: &ChatController, path: &Path) -> anyhow::Result<()> {
    let file = DroppedFile::from_path(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match controller.handle_drop(&DropPayload::default().with_file(file)) {
        Some(source) => println!("Staged image from {source}: {}", path.display()),
        None => bail!("{} is not an image", path.display()),
    }
    Ok(())
}
