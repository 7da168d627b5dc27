mod common;

use anyhow::anyhow;
use common::{chat, delivered, settings, state_with, EchoProvider, FailingProvider};
use gemini_relay::bot::dispatch::{ImageRequest, Outcome, Rejection};
use gemini_relay::bot::DispatchController;
use gemini_relay::config::Settings;
use gemini_relay::conversation::Role;
use std::sync::Arc;

const USER: i64 = 1001;

fn unlimited() -> Settings {
    Settings {
        rate_limit_messages: 1000,
        ..settings()
    }
}

#[tokio::test]
async fn twenty_one_messages_keep_the_latest_twenty_turns() {
    let state = state_with(unlimited());
    let llm = Arc::new(EchoProvider::default());
    let controller = DispatchController::new(state.clone(), llm.clone());

    for i in 1..=21 {
        let outcome = chat(&controller, USER, &format!("message {i}")).await;
        assert_eq!(outcome, Outcome::Reply(format!("reply to message {i}")));
    }

    let history = state.conversations.history(USER).await;
    assert_eq!(history.len(), 20);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[0].content, "message 12");
    assert_eq!(history[19].role, Role::Assistant);
    assert_eq!(history[19].content, "reply to message 21");
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
        assert_eq!(pair[1].content, format!("reply to {}", pair[0].content));
    }

    let snapshot = state.counters.snapshot();
    assert_eq!(snapshot.messages_processed, 21);
    assert_eq!(snapshot.errors, 0);

    // Only the very first message goes out without context
    assert_eq!(llm.single_calls(), 1);
    assert_eq!(llm.context_calls(), 20);
}

#[tokio::test]
async fn eleventh_message_in_window_is_rate_limited() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));

    for i in 0..10 {
        let outcome = chat(&controller, USER, &format!("hi {i}")).await;
        assert!(matches!(outcome, Outcome::Reply(_)));
    }
    let outcome = chat(&controller, USER, "one too many").await;
    assert_eq!(outcome, Outcome::Rejected(Rejection::RateLimited));

    let snapshot = state.counters.snapshot();
    assert_eq!(snapshot.messages_processed, 10);
    assert_eq!(snapshot.errors, 0);
    let history = state.conversations.history(USER).await;
    assert!(history.iter().all(|t| t.content != "one too many"));

    // Other users have their own window
    let outcome = controller.handle_text(USER + 1, "hello").await;
    assert!(matches!(outcome, Outcome::Reply(_)));
}

#[tokio::test]
async fn collaborator_failure_is_counted_and_reported() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(FailingProvider));

    let outcome = chat(&controller, USER, "hello").await;
    let Outcome::Failed(text) = outcome else {
        panic!("expected a failure outcome");
    };
    assert!(text.contains("Network error: timeout"), "unexpected text: {text}");

    let snapshot = state.counters.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.messages_processed, 0);
}

#[tokio::test]
async fn oversized_image_is_rejected_without_download() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));

    let request = ImageRequest {
        declared_size: Some(state.settings.max_image_size + 1),
        ..ImageRequest::default()
    };
    let outcome = controller
        .handle_image(USER, request, || async {
            Err(anyhow!("download must not run"))
        })
        .await;

    assert_eq!(outcome, Outcome::Rejected(Rejection::ImageTooLarge));
    assert_eq!(state.counters.snapshot().errors, 0);
}

#[tokio::test]
async fn unsupported_document_type_is_rejected() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));

    let request = ImageRequest {
        declared_size: Some(1024),
        mime_type: Some("image/gif".to_string()),
        caption: None,
    };
    let outcome = controller
        .handle_image(USER, request, || async {
            Err(anyhow!("download must not run"))
        })
        .await;

    assert_eq!(outcome, Outcome::Rejected(Rejection::UnsupportedImageType));
}

#[tokio::test]
async fn captioned_image_is_analyzed() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));

    let request = ImageRequest {
        declared_size: Some(3),
        mime_type: Some("image/png".to_string()),
        caption: Some("my cat".to_string()),
    };
    let outcome = controller
        .handle_image(USER, request, || async { Ok(vec![1, 2, 3]) })
        .await;
    let Outcome::Analysis(text) = &outcome else {
        panic!("expected an analysis");
    };

    assert!(text.starts_with("📝 Your caption: my cat"));
    assert!(text.contains("an image of 3 bytes"));
    assert_eq!(state.counters.snapshot().images_analyzed, 0);
    delivered(&controller, USER, &outcome).await;
    assert_eq!(state.counters.snapshot().images_analyzed, 1);
}

#[tokio::test]
async fn failed_download_counts_as_error() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));

    let outcome = controller
        .handle_image(USER, ImageRequest::default(), || async {
            Err(anyhow!("connection reset"))
        })
        .await;

    let Outcome::Failed(text) = outcome else {
        panic!("expected a failure outcome");
    };
    assert!(text.contains("connection reset"));
    let snapshot = state.counters.snapshot();
    assert_eq!(snapshot.errors, 1);
    assert_eq!(snapshot.images_analyzed, 0);
}

#[tokio::test]
async fn generation_paths() {
    let state = state_with(unlimited());
    let drawing = EchoProvider {
        image_bytes: Some(vec![0x89, 0x50, 0x4e, 0x47]),
        ..EchoProvider::default()
    };
    let controller = DispatchController::new(state.clone(), Arc::new(drawing));

    assert_eq!(
        controller.handle_generate(USER, "   ").await,
        Outcome::Rejected(Rejection::EmptyPrompt)
    );

    let outcome = controller.handle_generate(USER, "a sunset").await;
    let Outcome::Photo {
        image,
        caption,
        file_name,
    } = &outcome
    else {
        panic!("expected a photo");
    };
    assert_eq!(image, &vec![0x89, 0x50, 0x4e, 0x47]);
    assert!(caption.starts_with("🎨 Generated Image"));
    assert!(caption.contains("Prompt: a sunset"));
    assert_eq!(file_name, "a_sunset.png");
    delivered(&controller, USER, &outcome).await;
    assert_eq!(state.counters.snapshot().images_generated, 1);

    let text_only = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));
    let Outcome::Failed(text) = text_only.handle_generate(USER, "a sunset").await else {
        panic!("expected a failure outcome");
    };
    assert!(text.contains("Failed to generate image"));
    assert_eq!(state.counters.snapshot().errors, 1);
}

#[tokio::test]
async fn clear_forgets_history() {
    let state = state_with(settings());
    let controller = DispatchController::new(state.clone(), Arc::new(EchoProvider::default()));

    chat(&controller, USER, "remember this").await;
    assert_eq!(state.conversations.history(USER).await.len(), 2);

    controller.clear(USER).await;
    assert!(state.conversations.history(USER).await.is_empty());

    // Next message starts a fresh conversation
    let outcome = controller.handle_text(USER, "again").await;
    assert_eq!(outcome, Outcome::Reply("reply to again".to_string()));
}
