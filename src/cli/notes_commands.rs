use super::{assistant, catalog, AuthSession};
use crate::config::AppConfig;
use crate::core::ai::Attachment;
use crate::core::documents::NoteMetadata;
use anyhow::{Context, Result};
use tracing::info;

pub async fn search(
    config: &AppConfig,
    session: &AuthSession,
    query: &str,
    save: bool,
) -> Result<()> {
    session.sign_in().await?;
    let hits = session.documents(config)?.search(query).await?;

    if hits.is_empty() {
        println!("No documents found.");
        return Ok(());
    }
    for hit in &hits {
        println!("{}", hit.title);
        println!("    {}", hit.url);
        if let Some(id) = &hit.id {
            println!("    id: {}", id);
        }
    }

    if save {
        let catalog = catalog(config);
        let mut added = 0;
        for note in hits.iter().filter_map(NoteMetadata::from_hit) {
            if catalog.append_if_missing(note).await? {
                added += 1;
            }
        }
        println!("Added {} new note(s) to the catalog.", added);
    }
    Ok(())
}

pub async fn export_notes(config: &AppConfig, session: &AuthSession, query: &str) -> Result<()> {
    session.sign_in().await?;
    let hits = session.documents(config)?.search(query).await?;

    let kept = catalog(config).replace_with_hits(&hits).await?;
    println!(
        "Saved {} note(s) to {}",
        kept,
        config.notes_metadata_path.display()
    );
    Ok(())
}

pub async fn list_catalog(config: &AppConfig) -> Result<()> {
    let notes = catalog(config).list().await?;
    if notes.is_empty() {
        println!("The notes catalog is empty. Try `notes-assistant export-notes`.");
        return Ok(());
    }
    for note in notes {
        println!("{}  {}", note.id, note.name);
    }
    Ok(())
}

pub async fn summarize(config: &AppConfig, session: &AuthSession, ids: &[String]) -> Result<()> {
    let assistant = assistant(config)?;
    if !ids.is_empty() {
        session.sign_in().await?;
    }

    let documents = session
        .documents(config)?
        .fetch_all(ids)
        .await
        .context("Failed to download documents")?;
    info!(documents = documents.len(), "Summarizing documents");

    let attachments: Vec<Attachment> = documents
        .iter()
        .map(|bytes| Attachment::from_bytes(bytes))
        .collect();
    let summary = assistant.summarize(&attachments).await?;
    println!("{}", summary);
    Ok(())
}
