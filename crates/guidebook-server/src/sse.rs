//! Server-Sent Events change feed

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use guidebook_core::{DataEvent, EventBus};
use serde_json::json;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Create an SSE stream from the event bus
///
/// Lagged receivers skip the events they missed rather than closing.
pub fn create_sse_stream(event_bus: EventBus) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = event_bus.subscribe();
    let stream = BroadcastStream::new(rx);

    let sse_stream = stream.filter_map(|result: Result<DataEvent, _>| {
        result.ok().map(|event| Ok(to_sse_event(&event)))
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}

pub fn to_sse_event(event: &DataEvent) -> Event {
    let data = match event {
        DataEvent::ContentUpdated {
            country,
            path,
            version_tag,
        } => json!({ "country": country, "path": path, "versionTag": version_tag }),
        DataEvent::ContentInvalidated { country, path } => {
            json!({ "country": country, "path": path })
        }
        DataEvent::CountryChanged(slug) | DataEvent::CountryDeleted(slug) => {
            json!({ "slug": slug })
        }
        DataEvent::CacheCleared => json!({}),
    };

    Event::default().event(event.name()).data(data.to_string())
}
