use std::io::Write;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing_subscriber::EnvFilter;

use quickinterview_core::{
    ChatController, ChatError, ChatEvent, Config, Dispatcher, JsonSessionStore, Provider,
    ProviderConfig, SpeechCapture, SubmitOutcome, TranscriptBuffer,
};

#[derive(Parser)]
#[command(name = "quickinterview")]
#[command(about = "Practice interview questions with streamed AI answers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question in the current session
    Ask {
        /// Your question
        #[arg(required = true)]
        question: Vec<String>,
        /// Start a new session instead of continuing the current one
        #[arg(short, long)]
        new: bool,
    },
    /// Interactive session; each line you enter is sent as one utterance
    Chat,
    /// List stored sessions
    Sessions,
    /// Show or update provider settings
    Config {
        /// gemini, openai or claude
        #[arg(short, long)]
        provider: Option<String>,
        #[arg(short = 'k', long)]
        api_key: Option<String>,
        #[arg(short, long)]
        model: Option<String>,
    },
    /// List supported providers and suggested models
    Providers,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not read config, using defaults");
        Config::new()
    });

    match cli.command {
        Commands::Ask { question, new } => ask(&config, &question.join(" "), new).await?,
        Commands::Chat => chat(&config).await?,
        Commands::Sessions => list_sessions()?,
        Commands::Config {
            provider,
            api_key,
            model,
        } => update_config(config, provider, api_key, model)?,
        Commands::Providers => list_providers(),
    }

    Ok(())
}

fn controller(config: &Config) -> Result<(ChatController, UnboundedReceiver<ChatEvent>)> {
    let store = Arc::new(JsonSessionStore::open_default()?);
    let (controller, events) = ChatController::new(Dispatcher::default(), store)?;
    Ok((controller.with_system_prompt(config.system_prompt()), events))
}

async fn ask(config: &Config, question: &str, new: bool) -> Result<()> {
    let (controller, mut events) = controller(config)?;
    if new {
        controller.new_session();
    }
    send(&controller, &mut events, &config.provider_config(), question).await;
    Ok(())
}

async fn chat(config: &Config) -> Result<()> {
    let (controller, mut events) = controller(config)?;
    let provider_config = config.provider_config();
    let mut capture = TranscriptBuffer::new();

    println!("{}", "🎤 QuickInterview".bold().blue());
    println!(
        "{}",
        "Type a question and press Enter. /new starts a new session, /quit exits.".dimmed()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".bold().green());
        std::io::stdout().flush()?;

        capture.start();
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match line.trim() {
            "/quit" | "/exit" => break,
            "/new" => {
                capture.stop();
                capture.reset();
                controller.new_session();
                println!("{}", "New chat started".green());
                continue;
            }
            _ => {}
        }

        capture.push_result(&line, true);
        if let Some(error) = capture.take_error() {
            println!("{}", error.red());
            continue;
        }
        if let Some(utterance) = capture.finish_utterance() {
            if utterance != line.trim() {
                println!("{} {}", "Heard:".dimmed(), utterance);
            }
            send(&controller, &mut events, &provider_config, &utterance).await;
        }
    }

    Ok(())
}

async fn send(
    controller: &ChatController,
    events: &mut UnboundedReceiver<ChatEvent>,
    provider_config: &ProviderConfig,
    utterance: &str,
) {
    let submit = controller.submit(utterance, provider_config);
    tokio::pin!(submit);

    let outcome = loop {
        tokio::select! {
            outcome = &mut submit => break outcome,
            Some(event) = events.recv() => render(&event),
        }
    };
    while let Ok(event) = events.try_recv() {
        render(&event);
    }

    match outcome {
        Ok(SubmitOutcome::Ignored) => {
            println!("{}", "Nothing to send.".dimmed());
        }
        Ok(_) => {}
        Err(ChatError::MissingCredential) => {
            println!("{}", "API key required. Please configure it first:".red());
            println!(
                "  {}",
                "quickinterview config --provider gemini --api-key <KEY>".bold()
            );
        }
        Err(err) if err.is_configuration() => {
            println!("{}: {}", "Configuration error".red(), err);
        }
        // Failures were already rendered from the event stream
        Err(_) => {}
    }
}

fn render(event: &ChatEvent) {
    match event {
        ChatEvent::Delta { delta, .. } => {
            print!("{}", delta);
            std::io::stdout().flush().ok();
        }
        ChatEvent::Completed { .. } => println!("\n"),
        ChatEvent::Failed { error, .. } => {
            println!("\n{}: {}\n", "AI Error".red().bold(), error);
        }
        ChatEvent::Cancelled { .. } => println!("\n{}\n", "(stopped)".dimmed()),
        ChatEvent::SessionCreated { .. } | ChatEvent::MessageAdded { .. } => {}
    }
}

fn list_sessions() -> Result<()> {
    use quickinterview_core::SessionStore;

    let store = JsonSessionStore::open_default()?;
    let sessions = store.list()?;
    let current = store.current()?;

    println!("\n{}", "📚 Chat History".bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    if sessions.is_empty() {
        println!("{}", "No sessions yet. Ask a question to start one.".yellow());
        return Ok(());
    }

    for session in sessions.iter().rev() {
        let marker = if current.as_deref() == Some(session.id.as_str()) {
            "•".green().bold()
        } else {
            " ".normal()
        };
        println!(
            "{} {} {}",
            marker,
            session.title.bold(),
            format!("({} messages)", session.messages.len()).dimmed()
        );
    }

    Ok(())
}

fn update_config(
    mut config: Config,
    provider: Option<String>,
    api_key: Option<String>,
    model: Option<String>,
) -> Result<()> {
    let changed = provider.is_some() || api_key.is_some() || model.is_some();

    if let Some(provider) = provider {
        let provider: Provider = provider.parse()?;
        config.provider = Some(provider.as_str().to_string());
    }
    if let Some(api_key) = api_key {
        config.api_key = Some(api_key);
    }
    if let Some(model) = model {
        config.model = Some(model).filter(|m| !m.trim().is_empty());
    }

    if changed {
        config.save()?;
        println!("{}", "Settings saved successfully".green());
    }

    let key_status = if config.provider_config().has_credential() {
        "configured".green()
    } else {
        "missing".red()
    };
    println!("{} {}", "Provider:".bold(), config.provider_id());
    println!(
        "{} {}",
        "Model:".bold(),
        config.model.as_deref().unwrap_or("(provider default)")
    );
    println!("{} {}", "API key:".bold(), key_status);
    Ok(())
}

fn list_providers() {
    println!("\n{}", "🤖 Supported Providers".bold().blue());
    println!("{}", "=".repeat(30).dimmed());

    for provider in Provider::all() {
        println!(
            "\n{} {}",
            provider.display_name().bold().green(),
            format!("[{}]", provider.as_str()).dimmed()
        );
        for model in provider.models() {
            if model == provider.default_model() {
                println!("  • {} {}", model, "(default)".dimmed());
            } else {
                println!("  • {}", model);
            }
        }
    }
}
