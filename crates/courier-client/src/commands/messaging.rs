use std::path::Path;

use tracing::{debug, info, warn};

use courier_shared::{
    Attachment, CourierError, Envelope, Message, MessageKind, NewMessage, Result, User,
};

use super::{check_auth, with_timeout};
use crate::conversation::HistoryOutcome;
use crate::state::{lock, AppState};

/// Select the `index`-th directory entry (zero-based) and load its history.
pub async fn select_peer(state: &AppState, index: usize) -> Result<HistoryOutcome> {
    let peer = lock(&state.directory)?
        .get(index)
        .cloned()
        .ok_or_else(|| CourierError::Validation(format!("No user #{}", index + 1)))?;
    open_conversation(state, peer).await
}

/// Make `peer` the active conversation and replace the thread with its
/// history, unless another selection happened in the meantime.
pub async fn open_conversation(state: &AppState, peer: User) -> Result<HistoryOutcome> {
    let token = state.token()?;
    let ticket = lock(&state.conversation)?.begin_select(peer.clone());
    info!(peer = %peer.id, generation = ticket.generation, "Conversation selected");

    let fetched = with_timeout(
        state.config.request_timeout,
        state.backend.fetch_history(&token, &peer.id),
    )
    .await;

    match check_auth(state, fetched).await {
        Ok(messages) => {
            let outcome = lock(&state.conversation)?.apply_history(&ticket, messages);
            debug!(peer = %peer.id, ?outcome, "History fetched");
            Ok(outcome)
        }
        Err(e) => {
            if let Ok(mut conversation) = lock(&state.conversation) {
                conversation.fail_history(&ticket);
            }
            Err(e)
        }
    }
}

pub fn set_draft(state: &AppState, text: impl Into<String>) -> Result<()> {
    lock(&state.composer)?.text = text.into();
    Ok(())
}

/// Read a file into the composer.
pub async fn attach_file(state: &AppState, path: &Path) -> Result<MessageKind> {
    let metadata = tokio::fs::metadata(path).await?;
    if !metadata.is_file() {
        return Err(CourierError::Validation(format!(
            "{} is not a file",
            path.display()
        )));
    }

    let limit = state.config.max_upload_size;
    if metadata.len() > limit as u64 {
        return Err(CourierError::Validation(format!(
            "File is larger than {} MiB",
            limit / (1024 * 1024)
        )));
    }

    let bytes = tokio::fs::read(path).await?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("attachment")
        .to_string();
    let media_type = mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    let attachment = Attachment::new(file_name, media_type, bytes);
    let kind = attachment.kind();
    debug!(file = %attachment.file_name, size = attachment.size(), kind = kind.as_str(), "File attached");
    lock(&state.composer)?.attachment = Some(attachment);
    Ok(kind)
}

/// Drop the pending attachment. Returns whether there was one.
pub fn detach_file(state: &AppState) -> Result<bool> {
    Ok(lock(&state.composer)?.attachment.take().is_some())
}

/// Send the composer contents to the selected peer.
///
/// Blank input or no selection is a silent no-op (`Ok(None)`). Otherwise the
/// attachment is uploaded first, the message is created, the confirmed
/// message is appended and published, and the composer is cleared.
pub async fn send_message(state: &AppState) -> Result<Option<Message>> {
    let (text, attachment) = {
        let composer = lock(&state.composer)?;
        (composer.text.trim().to_string(), composer.attachment.clone())
    };
    let peer = lock(&state.conversation)?.peer().cloned();

    let Some(peer) = peer else {
        debug!("No conversation selected, nothing sent");
        return Ok(None);
    };
    if text.is_empty() && attachment.is_none() {
        return Ok(None);
    }

    let token = state.token()?;
    let limit = state.config.request_timeout;
    let kind = MessageKind::for_attachment(attachment.as_ref());

    let file_url = match &attachment {
        Some(file) => {
            let uploaded = with_timeout(limit, state.backend.upload_file(&token, file)).await;
            check_auth(state, uploaded).await?
        }
        None => String::new(),
    };

    let request = NewMessage {
        recipient_id: peer.id.clone(),
        kind,
        content: text,
        file_url,
    };
    let created = with_timeout(limit, state.backend.create_message(&token, &request)).await;
    let message = check_auth(state, created).await?;

    lock(&state.conversation)?.record_sent(message.clone());

    match Envelope::send_message(&message) {
        Ok(envelope) => {
            state.publish(envelope);
        }
        Err(e) => warn!(error = %e, "Failed to encode outgoing message"),
    }

    lock(&state.composer)?.clear();
    info!(msg_id = %message.id, peer = %peer.id, kind = kind.as_str(), "Message sent");
    Ok(Some(message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use courier_shared::protocol::EVENT_SEND_MESSAGE;
    use courier_shared::UserId;

    use crate::commands::auth::connect_realtime;
    use crate::realtime_bridge::handle_incoming;
    use crate::testing::{harness, message, user, Failure};

    fn ids(state: &AppState) -> Vec<String> {
        state
            .conversation
            .lock()
            .unwrap()
            .thread()
            .messages()
            .iter()
            .map(|m| m.id.as_str().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_late_history_for_previous_peer_is_discarded() {
        let h = harness(Some("stored"));
        h.backend.set_history("a", vec![message("a1", "a", "me")]);
        h.backend.set_history("b", vec![message("b1", "b", "me")]);
        let gate_a = h.backend.gate("a");
        let state = Arc::new(h.state);

        let first = {
            let state = state.clone();
            tokio::spawn(async move { open_conversation(&state, user("a")).await })
        };
        // Let the first request reach the gate before switching.
        while h.backend.calls().is_empty() {
            tokio::task::yield_now().await;
        }

        let second = open_conversation(&state, user("b")).await.unwrap();
        assert_eq!(second, HistoryOutcome::Applied(1));

        gate_a.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first, HistoryOutcome::Stale);

        assert_eq!(ids(&state), vec!["b1"]);
        let conversation = state.conversation.lock().unwrap();
        assert_eq!(conversation.peer().map(|p| p.id.as_str()), Some("b"));
    }

    #[tokio::test]
    async fn test_select_by_index() {
        let h = harness(Some("stored"));
        h.state.directory.lock().unwrap().replace(vec![user("a"), user("b")], None);
        h.backend.set_history("b", vec![message("b1", "b", "me")]);

        assert_eq!(select_peer(&h.state, 1).await.unwrap(), HistoryOutcome::Applied(1));
        assert!(matches!(
            select_peer(&h.state, 5).await,
            Err(CourierError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_composer_is_a_noop() {
        let h = harness(Some("stored"));
        h.state.conversation.lock().unwrap().begin_select(user("a"));
        set_draft(&h.state, "   ").unwrap();

        assert!(send_message(&h.state).await.unwrap().is_none());
        assert!(h.backend.calls().is_empty());
        assert!(ids(&h.state).is_empty());
    }

    #[tokio::test]
    async fn test_no_peer_is_a_noop() {
        let h = harness(Some("stored"));
        set_draft(&h.state, "hello").unwrap();
        assert!(send_message(&h.state).await.unwrap().is_none());
        assert!(h.backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_text_message_is_created_and_published() {
        let h = harness(Some("stored"));
        connect_realtime(&h.state).unwrap();
        h.state.conversation.lock().unwrap().begin_select(user("a"));
        set_draft(&h.state, "  hi there ").unwrap();

        let sent = send_message(&h.state).await.unwrap().unwrap();
        assert_eq!(sent.kind, MessageKind::Text);
        assert_eq!(sent.content.as_deref(), Some("hi there"));
        assert_eq!(h.backend.calls(), vec!["create"]);

        let published = h.connector.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].event, EVENT_SEND_MESSAGE);
        assert_eq!(published[0].message().unwrap(), sent);

        assert!(h.state.composer.lock().unwrap().is_blank());
    }

    #[tokio::test]
    async fn test_image_attachment_uploads_once_and_survives_echo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cat.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let h = harness(Some("stored"));
        connect_realtime(&h.state).unwrap();
        h.state.conversation.lock().unwrap().begin_select(user("a"));

        assert_eq!(attach_file(&h.state, &path).await.unwrap(), MessageKind::Image);
        let sent = send_message(&h.state).await.unwrap().unwrap();

        assert_eq!(h.backend.calls(), vec!["upload:cat.png", "create"]);
        assert_eq!(sent.kind, MessageKind::Image);
        assert_eq!(sent.file_url.as_deref(), Some("https://files.example/cat.png"));

        // The server echoes the message back over the realtime channel.
        let inbound = h.connector.inbound().unwrap();
        handle_incoming(&inbound, &serde_json::to_value(&sent).unwrap());

        assert_eq!(ids(&h.state), vec![sent.id.as_str().to_string()]);
        assert!(h.state.composer.lock().unwrap().attachment.is_none());
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_composer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        let h = harness(Some("stored"));
        h.state.conversation.lock().unwrap().begin_select(user("a"));
        assert_eq!(attach_file(&h.state, &path).await.unwrap(), MessageKind::Document);
        h.backend.fail_with(Failure::Network);

        assert!(send_message(&h.state).await.is_err());
        assert!(h.state.composer.lock().unwrap().attachment.is_some());
        assert!(ids(&h.state).is_empty());
    }

    #[tokio::test]
    async fn test_oversized_attachment_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let mut h = harness(Some("stored"));
        h.state.config.max_upload_size = 16;

        let err = attach_file(&h.state, &path).await.unwrap_err();
        assert!(matches!(err, CourierError::Validation(_)));
        assert!(!detach_file(&h.state).unwrap());
    }

    #[tokio::test]
    async fn test_hung_backend_times_out() {
        let mut h = harness(Some("stored"));
        h.state.config.request_timeout = Duration::from_millis(50);
        h.backend.hang();

        let err = open_conversation(&h.state, user("a")).await.unwrap_err();
        assert!(matches!(err, CourierError::Timeout(_)));
        let conversation = h.state.conversation.lock().unwrap();
        assert!(!conversation.is_loading());
        assert_eq!(conversation.peer().map(|p| p.id.clone()), Some(UserId::new("a")));
    }
}
