//! Generate command handler
//!
//! Runs a session, streams its events to the terminal and saves the
//! finished conversation.

use crate::config::Config;
use crate::conversation::SavedConversation;
use crate::error::Result;
use crate::generation::{FakeGenerator, GeminiGenerator, TextGenerator};
use crate::session::{GenerationSession, SessionEvent, SessionHandle, SessionRunner};
use crate::storage::{create_storage, ConversationStorage};
use colored::Colorize;
use std::io::Write;
use std::sync::Arc;

/// Options for one `generate` invocation
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub prompt: String,
    pub db_type: String,
    pub offline: bool,
    pub no_save: bool,
}

/// Run the generate command
///
/// Ctrl-C cancels the session; nothing is saved in that case.
pub async fn run_generate(config: &Config, options: GenerateOptions) -> Result<()> {
    let generator: Arc<dyn TextGenerator> = if options.offline {
        tracing::info!("Using offline generator");
        Arc::new(FakeGenerator::new())
    } else {
        Arc::new(GeminiGenerator::new(config.generator.gemini.clone())?)
    };

    let storage = if options.no_save {
        None
    } else {
        Some(create_storage(&config.storage)?)
    };

    let session = GenerationSession::new(options.prompt, options.db_type)
        .with_mode(config.session.mode.clone())
        .with_user_id(config.user.id.clone());
    let runner = SessionRunner::from_config(generator, &config.session);
    let handle = runner.spawn(session);

    let token = handle.cancellation_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling session");
            token.cancel();
        }
    });

    let outcome = stream_to_terminal(handle).await;
    ctrl_c.abort();
    let conversation = outcome?;

    if let Some(storage) = storage {
        save_conversation(storage.as_ref(), &conversation).await?;
    }
    Ok(())
}

/// Print every event of `handle` and return the finished conversation
pub async fn stream_to_terminal(mut handle: SessionHandle) -> Result<SavedConversation> {
    let mut stdout = std::io::stdout();
    while let Some(event) = handle.recv().await {
        print_event(&mut stdout, &event)?;
    }
    handle.wait().await
}

/// Persist a finished conversation and report where it went
pub async fn save_conversation(
    storage: &dyn ConversationStorage,
    conversation: &SavedConversation,
) -> Result<()> {
    storage.save_conversation(conversation).await?;
    println!(
        "{}",
        format!(
            "Saved \"{}\" ({}) to {} storage",
            conversation.title,
            conversation.id,
            storage.backend_name()
        )
        .green()
    );
    Ok(())
}

fn print_event(out: &mut impl Write, event: &SessionEvent) -> Result<()> {
    match event {
        SessionEvent::TaskStarted { title, agent, .. } => {
            writeln!(out)?;
            writeln!(out, "{} {}", title.bold().underline(), format!("({})", agent).dimmed())?;
        }
        SessionEvent::Chunk { text, .. } => {
            write!(out, "{}", text)?;
            out.flush()?;
        }
        SessionEvent::TaskCompleted { .. } => writeln!(out)?,
        SessionEvent::Insight(insight) => {
            tracing::debug!("{}: {}", insight.agent, insight.message);
        }
        SessionEvent::Completed(conversation) => {
            writeln!(out)?;
            writeln!(
                out,
                "{}",
                format!("Generation complete: {}", conversation.title).green().bold()
            )?;
        }
        SessionEvent::Failed { message } => {
            writeln!(out)?;
            writeln!(out, "{}", format!("Generation failed: {}", message).red())?;
        }
        SessionEvent::Cancelled => {
            writeln!(out)?;
            writeln!(out, "{}", "Generation cancelled".yellow())?;
        }
    }
    Ok(())
}
