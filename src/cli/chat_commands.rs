use super::{assistant, prompt, threads, AuthSession};
use crate::config::AppConfig;
use crate::core::ai::{format_citations, AssistantError, Attachment};
use crate::core::eliza::{is_farewell, ElizaBot, FAREWELL, GREETING};
use crate::core::threads::ConversationTurn;
use anyhow::{Context, Result};
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{debug, warn};

/// Interactive chat with the assistant. The given documents are attached to every message.
pub async fn chat(config: &AppConfig, session: &AuthSession, note_ids: &[String]) -> Result<()> {
    let assistant = assistant(config)?;

    let attachments: Vec<Attachment> = if note_ids.is_empty() {
        Vec::new()
    } else {
        session.sign_in().await?;
        session
            .documents(config)?
            .fetch_all(note_ids)
            .await
            .context("Failed to load attachments")?
            .iter()
            .map(|bytes| Attachment::from_bytes(bytes))
            .collect()
    };

    println!("Chatting with {}. Type `exit` to stop.", config.perplexity_model);
    let mut conversation = assistant.start_conversation();
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        prompt("you> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        if is_farewell(&line) {
            break;
        }

        match assistant.chat(&mut conversation, &line, &attachments).await {
            Ok(reply) => {
                println!("assistant> {}", reply.reply);
                if let Some(sources) = format_citations(&reply.citations) {
                    println!("{}", sources);
                }
            }
            Err(AssistantError::EmptyMessage) => continue,
            Err(e) => {
                warn!("Chat turn failed: {}", e);
                println!("error> {}", e);
            }
        }
    }

    debug!(turns = conversation.turns(), "Chat ended");
    Ok(())
}

/// Interactive ELIZA session, optionally saved as a conversation thread.
pub async fn eliza(config: &AppConfig, save: bool) -> Result<()> {
    let bot = ElizaBot::new().context("Failed to compile ELIZA rules")?;
    let recorder = if save { Some(threads(config).await?) } else { None };

    println!("eliza> {}", GREETING);
    let mut thread_id: Option<String> = None;
    let mut lines = BufReader::new(stdin()).lines();

    loop {
        prompt("you> ")?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if is_farewell(line) {
            break;
        }

        let reply = bot.respond(line);
        println!("eliza> {}", reply);

        if let Some(recorder) = &recorder {
            let id = recorder
                .record(thread_id.as_deref(), ConversationTurn::new(line, reply))
                .await?;
            thread_id = Some(id);
        }
    }

    println!("eliza> {}", FAREWELL);
    if let Some(id) = thread_id {
        println!("Conversation saved as thread {}", id);
    }
    Ok(())
}
