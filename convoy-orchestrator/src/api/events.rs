//! Deploy event streaming
//!
//! Server-sent events carrying the notifier's events of one deploy.

use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

use super::AppState;

/// GET /deploy/{id}/events
pub async fn stream_deploy_events(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!("Subscribing to events of deploy {}", id);
    let rx = state.events.subscribe();

    let stream = stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(envelope) if envelope.deploy_id == id => {
                    let event = match Event::default().json_data(&envelope) {
                        Ok(event) => event,
                        Err(err) => Event::default().comment(format!("unencodable event: {}", err)),
                    };
                    return Some((Ok(event), rx));
                }
                Ok(_) => continue,
                Err(RecvError::Lagged(_)) => {
                    return Some((Ok(Event::default().comment("lagged")), rx));
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
