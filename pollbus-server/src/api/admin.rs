//! Admin publish endpoint.

use axum::{Json, Router, http::StatusCode, response::IntoResponse, routing::post};
use compact_str::CompactString;
use pollbus_core::channel::{ChannelDescriptor, ChannelError};
use pollbus_core::publish::{OutboundNotification, PublishError};
use pollbus_sdk::objects::admin::{SendRequest, SendResponse};

use super::extractors::AdminAuth;
use crate::state::AppState;

pub(super) fn router() -> Router<AppState> {
    Router::new().route("/send", post(send))
}

/// `POST /admin/send` — publish a batch of notifications.
///
/// One transaction for the whole batch; the cross-process wake fires
/// after commit.
async fn send(
    state: axum::extract::State<AppState>,
    _auth: AdminAuth,
    Json(request): Json<SendRequest>,
) -> Result<impl IntoResponse, AdminApiError> {
    let mut entries = Vec::with_capacity(request.notifications.len());
    for entry in request.notifications {
        let channel = ChannelDescriptor::resolve_wire(&entry.channel)?;
        entries.push(OutboundNotification {
            tenant: CompactString::from(entry.tenant),
            channel,
            notification_type: CompactString::from(entry.kind),
            payload: entry.payload,
        });
    }

    let published = state.publisher.send_many(entries).await?;
    Ok(Json(SendResponse { published }))
}

// ---------------------------------------------------------------------------
// Error handling
// ---------------------------------------------------------------------------

/// Errors that can occur in the admin send handler.
#[derive(Debug)]
enum AdminApiError {
    /// Malformed channel descriptor (caller error).
    Channel(ChannelError),
    /// Publish failure.
    Publish(PublishError),
}

impl From<ChannelError> for AdminApiError {
    fn from(err: ChannelError) -> Self {
        AdminApiError::Channel(err)
    }
}

impl From<PublishError> for AdminApiError {
    fn from(err: PublishError) -> Self {
        AdminApiError::Publish(err)
    }
}

impl IntoResponse for AdminApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            AdminApiError::Channel(e) | AdminApiError::Publish(PublishError::Channel(e)) => {
                (StatusCode::BAD_REQUEST, format!("invalid channel: {e}")).into_response()
            }
            AdminApiError::Publish(PublishError::Database(e)) => {
                tracing::error!(error = %e, "Admin send database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error").into_response()
            }
        }
    }
}
