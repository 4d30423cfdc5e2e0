//! Notification audit log and operator test alerts

use axum::{
    Json,
    extract::{Query, State},
};
use tracing::info;

use crate::{
    api::{
        error::{ApiError, ApiResult},
        state::ApiState,
        types::{PageParams, TestAlertRequest, TestAlertResponse},
    },
    config::ConfigProvider,
    notify::{ChannelKind, channel::Sender, message::MessageBuilder, send_and_audit},
    storage::NotificationLogRow,
};

const TEST_ALERT_SUBJECT: &str = "IoT Test Alert";
const TEST_ALERT_BODY: &str = "This is a test alert";

/// GET /notifications?limit=&offset=
///
/// Newest first
pub async fn list_notifications(
    State(state): State<ApiState>,
    Query(page): Query<PageParams>,
) -> ApiResult<Json<Vec<NotificationLogRow>>> {
    let logs = state
        .storage
        .query_notification_logs(page.limit(), page.offset())
        .await?;

    Ok(Json(logs))
}

/// POST /send_email_alert
///
/// Sends one email to the configured recipients without touching alert
/// state. The attempt is audited with no cause and no record id.
pub async fn send_test_alert(
    State(state): State<ApiState>,
    request: Option<Json<TestAlertRequest>>,
) -> ApiResult<Json<TestAlertResponse>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let notifications = state.settings.settings()?.notifications;
    let email = &notifications.email;

    if email.recipients.is_empty() {
        return Err(ApiError::InvalidRequest(
            "No email recipients configured".to_string(),
        ));
    }

    let message = MessageBuilder::new(ChannelKind::Email)
        .recipients(&email.recipients)
        .subject(request.subject.as_deref().unwrap_or(TEST_ALERT_SUBJECT))
        .body(request.body.as_deref().unwrap_or(TEST_ALERT_BODY))
        .sender(Sender {
            email: email.sender_email.clone(),
            name: email.sender_name.clone(),
        })
        .build();

    send_and_audit(
        &state.channels,
        &message,
        notifications.timeout(),
        state.storage.as_ref(),
        None,
        None,
    )
    .await?;

    info!("test alert sent to {} recipient(s)", message.recipients.len());
    Ok(Json(TestAlertResponse {
        success: true,
        message: "Test alert sent".to_string(),
        recipients: message.recipients.len(),
    }))
}
