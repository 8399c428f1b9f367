use std::{env, sync::Once};

use rustydigest::{
    config,
    processing::{Document, SummarizationService, SummarizeOptions},
};

static INIT: Once = Once::new();

fn set_default_env(key: &str, value: &str) {
    let needs_value = env::var(key).map(|v| v.trim().is_empty()).unwrap_or(true);
    if needs_value {
        // SAFETY: Tests run serially via Once and we intentionally mutate process env.
        unsafe {
            env::set_var(key, value);
        }
    }
}

fn init_config_once() {
    INIT.call_once(|| {
        set_default_env("OLLAMA_URL", "http://127.0.0.1:11434");
        set_default_env("GENERATION_MODEL", "llama3.1");
        set_default_env("PROCESSING_PRESET", "fast");
        config::init_config();
    });
}

const LECTURE: &str = "Welcome to Rust Ownership 101, a session for developers new to systems \
programming.\n\nToday we will learn how ownership lets Rust free memory without a garbage \
collector. Every value has exactly one owner, and when that owner goes out of scope the value is \
dropped.\n\nAssigning a value to a new binding moves it. After a move the original binding can no \
longer be used, which the compiler checks for you.\n\nBorrowing lets a function read a value \
without taking it. Remember: you can have many shared references or one mutable reference, but \
never both at once.\n\nAction item: rewrite last week's exercise so it borrows instead of \
cloning.";

#[tokio::test]
#[ignore = "Requires live Ollama"]
async fn live_backend_health_probe() {
    init_config_once();
    let service = SummarizationService::from_config(config::get_config());
    assert!(
        service.backend_available().await,
        "Ollama should be reachable at {}",
        config::get_config().ollama_url
    );
}

#[tokio::test]
#[ignore = "Requires live Ollama with the generation model pulled"]
async fn live_summarization_roundtrip() {
    init_config_once();
    let service = SummarizationService::from_config(config::get_config());
    let document = Document::new("Rust Ownership 101", LECTURE);
    let id = document.id.clone();
    let options = SummarizeOptions::new(service.processing_config(None));

    let result = service
        .summarize(document, options)
        .await
        .expect("failed to summarize against the live backend");
    assert!(
        !result.styled_summary.trim().is_empty(),
        "styled summary must not be empty: {result:?}"
    );
    assert_eq!(result.processing_stats.total_chunks, 1);

    let stored = service.get_summary(&id).await.expect("result stored");
    assert_eq!(stored.styled_summary, result.styled_summary);
}
