use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use crate::{
    dto::{sse::ServerEvent, vote::VoteModuleView},
    state::SharedState,
};

/// SSE event name carrying a [`VoteModuleView`].
pub const TALLY_EVENT: &str = "tally";

/// Subscribe to the live tally of one module.
pub fn subscribe_votes(state: &SharedState, module_id: &str) -> broadcast::Receiver<ServerEvent> {
    state.subscribe_vote_feed(module_id)
}

/// Push the current tally of `module` to everyone watching it.
///
/// Nothing is allocated for modules without subscribers.
pub fn publish_tally(state: &SharedState, module: &VoteModuleView) {
    let Some(hub) = state.existing_vote_feed(&module.id) else {
        return;
    };

    match ServerEvent::json(TALLY_EVENT, module) {
        Ok(event) => {
            let delivered = hub.broadcast(event);
            debug!(module_id = %module.id, delivered, "tally published");
        }
        Err(err) => warn!(module_id = %module.id, error = %err, "failed to encode tally event"),
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// releasing the module feed once the client disconnects.
pub fn to_sse_stream(
    mut receiver: broadcast::Receiver<ServerEvent>,
    state: SharedState,
    module_id: String,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let event = Event::default().event(payload.name).data(payload.data);
                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        // every tally is a full snapshot, so the next one catches up
                        Err(RecvError::Lagged(skipped)) => {
                            debug!(%module_id, skipped, "vote feed subscriber lagged");
                        }
                    }
                }
            }
        }

        drop(receiver);
        state.release_vote_feed(&module_id);
        info!(%module_id, "vote SSE stream disconnected");
    });

    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
