//! Demo of the context engine with local hash embeddings.
//!
//! Usage: RUST_LOG=debug cargo run -p semctx-retrieval --example demo

use std::sync::Arc;

use chrono::Utc;
use semctx_retrieval::{
    ChatMessage, ContextEngine, EmbeddingProviderType, InMemoryCatalog, Priority, Role,
};
use semctx_vector_store::{ConversationRecord, FileRecord, FileStatus, MessageRecord};
use tracing_subscriber::EnvFilter;

const USER_ID: i64 = 42;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🚀 Semantic Context Retrieval Demo\n");

    let catalog = Arc::new(InMemoryCatalog::new());
    seed(&catalog).await;

    let engine = ContextEngine::builder()
        .with_catalog(catalog)
        .with_embedding_provider(EmbeddingProviderType::Hash)
        .build()
        .await?;

    // Queue the history and drain it in one pass
    println!("📥 Vectorizing history...");
    for (message_id, conversation_id) in [(1, 1), (2, 1), (3, 2)] {
        engine
            .queue_message_vectorization(message_id, conversation_id, Priority::Normal)
            .await;
    }
    engine.queue_conversation_vectorization(1, Priority::Low).await;
    engine.queue_conversation_vectorization(2, Priority::Low).await;
    let report = engine.drain_queue().await;
    println!("   ✓ Embedded: {}", report.embedded);
    println!("   ✓ Dropped: {}\n", report.dropped);

    println!("📄 Indexing file...");
    let chunks = engine
        .index_file_content(
            7,
            "Packing list: passport, rail pass, charger. The train to Lyon leaves at 9am.",
        )
        .await?;
    println!("   ✓ Chunks stored: {chunks}\n");

    let messages = vec![
        ChatMessage::user("What time does the train to Lyon leave?").with_attachments([7]),
    ];
    let options = engine.default_options().with_threshold(0.3);
    let context = engine
        .enhance_messages_with_context(messages, USER_ID, &options, None)
        .await?;

    println!("🔎 Outcome: {:?}", context.outcome);
    println!("   Similar messages: {}", context.similar_messages.len());
    println!("   Similar conversations: {}", context.similar_conversations.len());
    println!("   File snippets: {}\n", context.file_snippets.len());
    println!("📝 System message:\n{}\n", context.contextual_system_message);

    let stats = engine.stats().await;
    println!("📊 Engine Statistics:\n{}", serde_json::to_string_pretty(&stats)?);

    engine.shutdown().await?;
    Ok(())
}

async fn seed(catalog: &InMemoryCatalog) {
    let now = Utc::now();
    for (id, title) in [(1, "Weekend in Lyon"), (2, "Sourdough")] {
        catalog
            .insert_conversation(ConversationRecord {
                id,
                user_id: USER_ID,
                project_id: None,
                title: title.to_string(),
                archived: false,
                created_at: now,
            })
            .await;
    }

    for (id, conversation_id, role, content) in [
        (1, 1, Role::User, "Find me a train to Lyon on Saturday morning"),
        (2, 1, Role::Assistant, "The 9am train to Lyon arrives before noon"),
        (3, 2, Role::User, "How long should sourdough proof overnight?"),
    ] {
        catalog
            .insert_message(MessageRecord {
                id,
                conversation_id,
                role,
                content: content.to_string(),
                created_at: now,
            })
            .await;
    }

    catalog
        .insert_file(FileRecord {
            id: 7,
            user_id: USER_ID,
            project_id: None,
            name: "packing.txt".to_string(),
            mime_type: "text/plain".to_string(),
            status: FileStatus::Active,
        })
        .await;
}
