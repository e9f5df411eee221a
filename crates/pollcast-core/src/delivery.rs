use crate::error::CoreError;
use pollcast_db::DbPool;
use pollcast_models::poll::PollDelivery;

/// External id for a poll delivered as an inline keyboard.
///
/// Button deliveries have no Bot API poll id, so one is derived per chat.
pub fn button_external_id(logical_poll_id: &str, chat_id: i64) -> String {
    format!("button:{logical_poll_id}:{chat_id}")
}

/// Records that `delivery` was sent.
///
/// Recording the same delivery twice is a no-op. A different delivery under
/// an already recorded external id fails with `DuplicateDelivery`.
pub async fn record_delivery(
    pool: &DbPool,
    delivery: &PollDelivery,
) -> Result<PollDelivery, CoreError> {
    let inserted = pollcast_db::poll_messages::insert_poll_message(
        pool,
        &delivery.logical_poll_id,
        &delivery.external_poll_id,
        delivery.chat_id,
        delivery.message_id,
    )
    .await?;
    if let Some(row) = inserted {
        return Ok(row.into());
    }

    let existing: PollDelivery =
        pollcast_db::poll_messages::get_poll_message(pool, &delivery.external_poll_id)
            .await?
            .ok_or(CoreError::NotFound)?
            .into();
    if existing == *delivery {
        tracing::debug!(external_poll_id = %delivery.external_poll_id, "delivery already recorded");
        Ok(existing)
    } else {
        tracing::warn!(
            external_poll_id = %delivery.external_poll_id,
            recorded_poll = %existing.logical_poll_id,
            "conflicting delivery for an already recorded external poll id"
        );
        Err(CoreError::DuplicateDelivery {
            external_poll_id: delivery.external_poll_id.clone(),
        })
    }
}

/// Maps an external poll id back to its logical poll. A miss is `None`.
pub async fn resolve(pool: &DbPool, external_poll_id: &str) -> Result<Option<String>, CoreError> {
    Ok(pollcast_db::poll_messages::find_logical_poll_id(pool, external_poll_id).await?)
}

pub async fn deliveries_for_poll(
    pool: &DbPool,
    logical_poll_id: &str,
) -> Result<Vec<PollDelivery>, CoreError> {
    let rows = pollcast_db::poll_messages::get_poll_messages_for_poll(pool, logical_poll_id).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
