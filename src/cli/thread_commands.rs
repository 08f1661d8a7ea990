use super::{threads, ThreadAction};
use crate::config::AppConfig;
use anyhow::Result;

pub async fn handle(config: &AppConfig, action: ThreadAction) -> Result<()> {
    let service = threads(config).await?;

    match action {
        ThreadAction::List => {
            let all = service.list().await?;
            if all.is_empty() {
                println!("No saved threads.");
            }
            for thread in all {
                println!(
                    "{}  {} turn(s)  updated {}",
                    thread.id,
                    thread.turns.len(),
                    thread.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        ThreadAction::Show { id } => {
            let thread = service.get(&id).await?;
            println!(
                "Thread {} (started {})",
                thread.id,
                thread.created_at.format("%Y-%m-%d %H:%M")
            );
            for turn in &thread.turns {
                println!("you> {}", turn.user);
                println!("eliza> {}", turn.bot);
            }
        }
        ThreadAction::Delete { id } => {
            service.delete(&id).await?;
            println!("Deleted thread {}", id);
        }
    }
    Ok(())
}
