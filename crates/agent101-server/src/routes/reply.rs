use crate::protocol::{convert_messages, message_events, to_wire_message, Event, RunAgentInput};
use crate::state::AppState;
use agent101::models::state::ConversationState;
use agent101::models::tool::Tool;
use axum::{
    body::Body,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use futures::Stream;
use http::header;
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

// Server sent events carrying AG-UI events
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> Response {
        let body = Body::from_stream(self);

        (
            [
                (header::CONTENT_TYPE, "text/event-stream"),
                (header::CACHE_CONTROL, "no-cache"),
                (header::CONNECTION, "keep-alive"),
            ],
            body,
        )
            .into_response()
    }
}

async fn send(tx: &mpsc::Sender<String>, event: Event) -> Result<(), mpsc::error::SendError<String>> {
    tx.send(event.to_sse()).await
}

/// Resume the stored conversation for this thread, if checkpoints are on, and fold in what
/// the interface sent
async fn load_conversation(
    state: &AppState,
    thread_id: &str,
    input: RunAgentInput,
) -> anyhow::Result<ConversationState> {
    let mut conversation = match state.runner.controller().checkpoints() {
        Some(store) => store.load(thread_id).await?.unwrap_or_default(),
        None => ConversationState::default(),
    };
    conversation.merge_messages(convert_messages(input.messages));
    conversation.replace_tools(input.tools.into_iter().map(Tool::from))?;
    Ok(conversation)
}

async fn run(
    state: &AppState,
    thread_id: &str,
    run_id: &str,
    input: RunAgentInput,
    tx: &mpsc::Sender<String>,
) -> Result<(), mpsc::error::SendError<String>> {
    send(
        tx,
        Event::RunStarted {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
        },
    )
    .await?;

    let _lane = state.lanes.acquire(thread_id).await;

    let conversation = match load_conversation(state, thread_id, input).await {
        Ok(conversation) => conversation,
        Err(e) => {
            tracing::error!(thread_id, run_id, "Rejected run input: {:#}", e);
            return send(
                tx,
                Event::RunError {
                    message: e.to_string(),
                    code: "invalid_request".to_string(),
                },
            )
            .await;
        }
    };
    let known = conversation.messages.len();

    let outcome = match state.runner.run(&conversation).await {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::error!(thread_id, run_id, "Turn failed: {}", e);
            return send(
                tx,
                Event::RunError {
                    message: e.to_string(),
                    code: e.code().to_string(),
                },
            )
            .await;
        }
    };
    let (done, model_calls) = (outcome.done, outcome.model_calls);

    // a pending tool request stays in the history so the client can answer it
    let mut committed = outcome.state;
    if let Some(pending) = outcome.pending {
        committed.push(pending);
    }

    if let Some(store) = state.runner.controller().checkpoints() {
        if let Err(e) = store.save(thread_id, &committed).await {
            tracing::error!(thread_id, run_id, "Failed to save checkpoint: {:#}", e);
            return send(
                tx,
                Event::RunError {
                    message: e.to_string(),
                    code: "checkpoint_error".to_string(),
                },
            )
            .await;
        }
    }

    for message in committed.messages.iter().skip(known) {
        for event in message_events(message) {
            send(tx, event).await?;
        }
    }

    send(
        tx,
        Event::MessagesSnapshot {
            messages: committed.messages.iter().map(to_wire_message).collect(),
        },
    )
    .await?;

    tracing::info!(thread_id, run_id, done, model_calls, "Run finished");
    send(
        tx,
        Event::RunFinished {
            thread_id: thread_id.to_string(),
            run_id: run_id.to_string(),
        },
    )
    .await
}

async fn handler(State(state): State<AppState>, Json(input): Json<RunAgentInput>) -> SseResponse {
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let thread_id = input
        .thread_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let run_id = input
        .run_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tracing::info!(
        %thread_id,
        %run_id,
        messages = input.messages.len(),
        tools = input.tools.len(),
        context = input.context.len(),
        has_state = !input.state.is_null(),
        has_forwarded_props = !input.forwarded_props.is_null(),
        "Run requested"
    );

    // Spawn task to handle streaming. If the client goes away the turn is dropped, which
    // cancels the outstanding model request before anything is committed.
    tokio::spawn(async move {
        tokio::select! {
            result = run(&state, &thread_id, &run_id, input, &tx) => {
                if let Err(e) = result {
                    tracing::error!("Error sending event through channel: {}", e);
                }
            }
            _ = tx.closed() => {
                tracing::info!(%thread_id, %run_id, "Client disconnected, run abandoned");
            }
        }
    });

    SseResponse::new(stream)
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new().route("/", post(handler)).with_state(state)
}
