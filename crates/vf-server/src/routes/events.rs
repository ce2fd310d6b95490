//! Server-Sent Events (SSE) handler.
//!
//! Subscribes to the [`vf_core::events::EventBus`], optionally filters by
//! category, replays recent events for late joiners, and sends heartbeats.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;

use vf_core::events::EventCategory;

use crate::context::AppContext;

#[derive(Debug, Deserialize, utoipa::IntoParams)]
pub struct EventsQuery {
    /// "queue" or "results"; anything else streams everything.
    pub category: Option<String>,
}

/// GET /api/events
pub async fn events_handler(
    State(ctx): State<AppContext>,
    Query(params): Query<EventsQuery>,
) -> Sse<impl futures_core::Stream<Item = Result<Event, Infallible>>> {
    let filter = params.category.as_deref().and_then(parse_category);

    let recent = ctx.event_bus.recent_events(50);
    let mut rx = ctx.event_bus.subscribe();

    let stream = async_stream::stream! {
        for event in recent.into_iter().rev() {
            if filter.map_or(true, |c| c == event.category) {
                if let Ok(data) = serde_json::to_string(&event) {
                    yield Ok(Event::default().data(data));
                }
            }
        }

        loop {
            match rx.recv().await {
                Ok(event) => {
                    if filter.map_or(true, |c| c == event.category) {
                        if let Ok(data) = serde_json::to_string(&event) {
                            yield Ok(Event::default().data(data));
                        }
                    }
                }
                Err(RecvError::Lagged(n)) => {
                    tracing::debug!("SSE client lagged by {n} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn parse_category(s: &str) -> Option<EventCategory> {
    match s {
        "queue" => Some(EventCategory::Queue),
        "results" => Some(EventCategory::Results),
        _ => None,
    }
}
