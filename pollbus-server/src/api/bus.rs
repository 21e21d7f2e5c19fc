//! The long-poll endpoint.

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use pollbus_core::channel::{ChannelDescriptor, ChannelError};
use pollbus_core::dispatch::DispatchError;
use pollbus_core::entities::notification::Notification;
use pollbus_sdk::objects::bus::{BusMessage, PollItem, PollRequest};

use super::extractors::CallerContext;
use crate::state::AppState;

pub(super) fn router() -> Router<AppState> {
    Router::new().route("/poll", post(poll))
}

/// `POST /bus/poll` — one long poll.
///
/// Blocks until something arrives on the subscribed channels (plus the
/// tenant broadcast channel) or the bus timeout elapses; an empty array
/// is the normal timeout response.
async fn poll(
    state: axum::extract::State<AppState>,
    caller: CallerContext,
    Json(request): Json<PollRequest>,
) -> Result<impl IntoResponse, BusApiError> {
    if let Some(inactivity) = request.options.bus_inactivity {
        // Presence hint only; not part of the notification protocol.
        tracing::debug!(tenant = %caller.tenant, inactivity, "Presence hint received");
    }

    let channels = request
        .channels
        .iter()
        .map(ChannelDescriptor::resolve_wire)
        .collect::<Result<Vec<_>, _>>()?;

    let notifications = state
        .dispatcher
        .dispatch(
            &caller.tenant,
            &channels,
            request.last,
            request.options.peek,
        )
        .await?;

    let items = notifications
        .into_iter()
        .map(to_item)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(items))
}

/// Convert a stored notification into its wire shape.
fn to_item(notification: Notification) -> Result<PollItem, BusApiError> {
    let message: BusMessage = serde_json::from_value(notification.message)
        .map_err(|e| BusApiError::CorruptMessage(notification.id, e))?;
    Ok(PollItem {
        id: notification.id,
        message,
    })
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in the poll handler.
#[derive(Debug)]
enum BusApiError {
    /// Malformed channel descriptor (caller error).
    Channel(ChannelError),
    /// Dispatcher failure.
    Dispatch(DispatchError),
    /// A stored message no longer decodes as `{type, payload}`.
    CorruptMessage(i64, serde_json::Error),
}

impl From<ChannelError> for BusApiError {
    fn from(err: ChannelError) -> Self {
        BusApiError::Channel(err)
    }
}

impl From<DispatchError> for BusApiError {
    fn from(err: DispatchError) -> Self {
        BusApiError::Dispatch(err)
    }
}

impl IntoResponse for BusApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            BusApiError::Channel(e) | BusApiError::Dispatch(DispatchError::Channel(e)) => {
                (StatusCode::BAD_REQUEST, format!("invalid channel: {e}")).into_response()
            }
            BusApiError::Dispatch(DispatchError::NotRunning) => {
                (StatusCode::SERVICE_UNAVAILABLE, "bus is not running").into_response()
            }
            BusApiError::Dispatch(DispatchError::Database(e)) => {
                tracing::error!(error = %e, "Poll database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
            BusApiError::CorruptMessage(id, e) => {
                tracing::error!(notification_id = id, error = %e, "Corrupt stored message");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
