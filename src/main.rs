use std::sync::Arc;

use recall_engine::{Engine, SearchFilters, TurnInput};
use recall_entities::{Memory, MemoryRole};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Boots the engine, starts the background worker loop, and runs a small
/// ingest/search smoke sequence so `recall run` demonstrates the whole
/// pipeline end to end. No HTTP or CLI surface is provided here; embedding
/// `recall-engine` into a transport of the caller's choosing is the
/// intended integration point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::registry()
    .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")).into()))
    .with(tracing_subscriber::fmt::layer())
    .init();

  let data_root = std::env::var("RECALL_DATA_ROOT").unwrap_or_else(|_| "./data/recall".to_owned());
  let engine = Arc::new(Engine::open(&data_root).await?);

  let worker_engine = engine.clone();
  let worker_handle = tokio::spawn(async move { worker_engine.tasks().clone().run(worker_engine.clone()).await });

  run_demo(&engine).await?;

  engine.flush().await?;
  worker_handle.abort();
  Ok(())
}

async fn run_demo(engine: &Engine) -> anyhow::Result<()> {
  let turn = TurnInput {
    user_id: "demo-user".to_owned(),
    session_id: "demo-session".to_owned(),
    character_id: None,
    user_text: "I'm moving to Lisbon next spring for a new job.".to_owned(),
    assistant_text: "That's exciting — congratulations on the move and the new role!".to_owned(),
  };
  let added = engine.add_turn(turn).await?;
  tracing::info!(user_memory = %added.user_memory_id, assistant_memory = %added.assistant_memory_id, "ingested a demo turn");

  engine.add(Memory::builder("User prefers concise answers.", MemoryRole::System, "demo-user", "demo-session").build()).await?;

  let mut filters = SearchFilters::default();
  filters.user_id = Some("demo-user".to_owned());
  filters.session_id = Some("demo-session".to_owned());

  let context = engine.build_context("Where is the user moving?", &filters, 512).await?;
  tracing::info!(tokens = context.total_tokens(), "built context block");
  println!("{}", context.rendered());

  Ok(())
}
