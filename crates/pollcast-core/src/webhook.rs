use crate::error::CoreError;
use crate::updates::{profile_of, Callback, InboundUpdate};
use chrono::Utc;
use pollcast_db::DbPool;
use pollcast_telegram::types::User;
use pollcast_telegram::BotApi;

pub const ALREADY_ANSWERED: &str = "You have already answered this poll";
pub const ANSWER_RECORDED: &str = "Thanks, your answer has been recorded!";
pub const ANSWER_FAILED: &str = "Could not save your answer, please try again";
pub const INVALID_POLL_DATA: &str = "Invalid poll data";
pub const POLL_UNAVAILABLE: &str = "This poll is no longer available";
pub const BUTTON_THANKS: &str = "Thanks for your response!";
pub const WELCOME: &str = "👋 Welcome!\n\nYou are now subscribed and will receive updates and polls here.";

/// Everything the update handlers need from the running service.
pub struct WebhookContext<'a, B: BotApi> {
    pub db: &'a DbPool,
    pub bot: &'a B,
    /// Moderator chat that receives a line for every button press.
    pub notify_chat_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    ResponseRecorded {
        logical_poll_id: String,
        respondent_id: i64,
    },
    ResponseRetracted {
        logical_poll_id: String,
        respondent_id: i64,
    },
    AlreadyAnswered {
        logical_poll_id: String,
        respondent_id: i64,
    },
    /// A poll answer whose external id matched no delivery.
    Unresolved { external_poll_id: String },
    Rejected { reason: String },
    ButtonLogged,
    Subscribed { chat_id: i64 },
    Ignored,
}

/// Applies one decoded update.
///
/// Bot API failures on acknowledgements and notifications are logged and do
/// not fail the update; persistence failures are returned.
pub async fn handle_update<B: BotApi>(
    ctx: &WebhookContext<'_, B>,
    update: InboundUpdate,
) -> Result<UpdateOutcome, CoreError> {
    match update {
        InboundUpdate::PollAnswer {
            external_poll_id,
            respondent,
            option_indices,
        } => handle_poll_answer(ctx, &external_poll_id, &respondent, &option_indices).await,
        InboundUpdate::CallbackPoll {
            callback,
            logical_poll_id,
            option_index,
        } => handle_poll_callback(ctx, &callback, &logical_poll_id, option_index).await,
        InboundUpdate::CallbackMalformedPoll { callback } => {
            acknowledge(ctx, &callback, INVALID_POLL_DATA, true).await;
            Ok(UpdateOutcome::Rejected {
                reason: "malformed poll callback".into(),
            })
        }
        InboundUpdate::CallbackButton {
            callback,
            question,
            label,
        } => {
            notify(
                ctx,
                &format!(
                    "❓ {question}\n\n👤 {}\n🔘 Pressed: \"{label}\"",
                    respondent_line(&callback.from)
                ),
            )
            .await;
            acknowledge(ctx, &callback, BUTTON_THANKS, false).await;
            edit_prompt(ctx, &callback, &format!("✅ {BUTTON_THANKS}")).await;
            Ok(UpdateOutcome::ButtonLogged)
        }
        InboundUpdate::StartCommand { chat_id, profile } => {
            crate::subscribers::subscribe(ctx.db, chat_id, &profile).await?;
            if let Err(e) = ctx.bot.send_message(chat_id, WELCOME, None).await {
                tracing::warn!(chat_id, error = %e, "failed to send welcome message");
            }
            Ok(UpdateOutcome::Subscribed { chat_id })
        }
        InboundUpdate::OtherMessage { chat_id, .. } => {
            tracing::debug!(chat_id, "ignoring message");
            Ok(UpdateOutcome::Ignored)
        }
        InboundUpdate::Ignored { update_id, reason } => {
            tracing::debug!(update_id, reason, "ignoring update");
            Ok(UpdateOutcome::Ignored)
        }
    }
}

async fn handle_poll_answer<B: BotApi>(
    ctx: &WebhookContext<'_, B>,
    external_poll_id: &str,
    respondent: &User,
    option_indices: &[i32],
) -> Result<UpdateOutcome, CoreError> {
    let Some(logical_poll_id) = crate::delivery::resolve(ctx.db, external_poll_id).await? else {
        tracing::warn!(
            external_poll_id,
            respondent_id = respondent.id,
            "poll answer for unknown poll, storing as unresolved"
        );
        pollcast_db::unresolved_answers::upsert_unresolved_answer(
            ctx.db,
            external_poll_id,
            respondent.id,
            option_indices,
            Utc::now(),
        )
        .await?;
        return Ok(UpdateOutcome::Unresolved {
            external_poll_id: external_poll_id.to_string(),
        });
    };

    if option_indices.is_empty() {
        crate::responses::retract_response(ctx.db, &logical_poll_id, respondent.id).await?;
        return Ok(UpdateOutcome::ResponseRetracted {
            logical_poll_id,
            respondent_id: respondent.id,
        });
    }

    match crate::responses::upsert_response(ctx.db, &logical_poll_id, respondent.id, option_indices, None)
        .await
    {
        Ok(_) => Ok(UpdateOutcome::ResponseRecorded {
            logical_poll_id,
            respondent_id: respondent.id,
        }),
        Err(CoreError::Validation(reason)) => {
            tracing::warn!(%logical_poll_id, respondent_id = respondent.id, %reason, "rejected poll answer");
            Ok(UpdateOutcome::Rejected { reason })
        }
        Err(e) => Err(e),
    }
}

async fn handle_poll_callback<B: BotApi>(
    ctx: &WebhookContext<'_, B>,
    callback: &Callback,
    logical_poll_id: &str,
    option_index: i32,
) -> Result<UpdateOutcome, CoreError> {
    let respondent_id = callback.from.id;
    if crate::responses::has_responded(ctx.db, logical_poll_id, respondent_id).await? {
        acknowledge(ctx, callback, ALREADY_ANSWERED, true).await;
        return Ok(UpdateOutcome::AlreadyAnswered {
            logical_poll_id: logical_poll_id.to_string(),
            respondent_id,
        });
    }

    let Some(poll) = crate::polls::get_poll(ctx.db, logical_poll_id).await? else {
        acknowledge(ctx, callback, POLL_UNAVAILABLE, true).await;
        return Ok(UpdateOutcome::Rejected {
            reason: "poll not found".into(),
        });
    };
    let Some(option_text) = poll.option_text(option_index).map(str::to_string) else {
        acknowledge(ctx, callback, INVALID_POLL_DATA, true).await;
        return Ok(UpdateOutcome::Rejected {
            reason: format!("option {option_index} out of range"),
        });
    };

    if let Err(e) = crate::responses::upsert_response(
        ctx.db,
        logical_poll_id,
        respondent_id,
        &[option_index],
        Some(vec![option_text.clone()]),
    )
    .await
    {
        acknowledge(ctx, callback, ANSWER_FAILED, true).await;
        return Err(e);
    }

    notify(
        ctx,
        &format!(
            "❓ {}\n\n👤 {}\n🔘 Chose: \"{option_text}\"",
            poll.question,
            respondent_line(&callback.from)
        ),
    )
    .await;
    acknowledge(ctx, callback, ANSWER_RECORDED, false).await;
    edit_prompt(ctx, callback, &format!("✅ You answered: \"{option_text}\"")).await;

    Ok(UpdateOutcome::ResponseRecorded {
        logical_poll_id: logical_poll_id.to_string(),
        respondent_id,
    })
}

fn respondent_line(user: &User) -> String {
    format!("{} (ID: {})", profile_of(user).display_tag(), user.id)
}

async fn acknowledge<B: BotApi>(ctx: &WebhookContext<'_, B>, callback: &Callback, text: &str, alert: bool) {
    if let Err(e) = ctx.bot.answer_callback_query(&callback.query_id, text, alert).await {
        tracing::warn!(query_id = %callback.query_id, error = %e, "failed to answer callback query");
    }
}

/// Appends `suffix` to the prompt and drops its keyboard.
async fn edit_prompt<B: BotApi>(ctx: &WebhookContext<'_, B>, callback: &Callback, suffix: &str) {
    let Some(prompt) = &callback.prompt else {
        return;
    };
    let text = if prompt.text.is_empty() {
        suffix.to_string()
    } else {
        format!("{}\n\n{suffix}", prompt.text)
    };
    if let Err(e) = ctx
        .bot
        .edit_message_text(prompt.chat_id, prompt.message_id, &text)
        .await
    {
        tracing::warn!(chat_id = prompt.chat_id, error = %e, "failed to edit prompt");
    }
}

async fn notify<B: BotApi>(ctx: &WebhookContext<'_, B>, text: &str) {
    let Some(chat_id) = ctx.notify_chat_id else {
        return;
    };
    if let Err(e) = ctx.bot.send_message(chat_id, text, None).await {
        tracing::warn!(chat_id, error = %e, "failed to notify moderator chat");
    }
}

/// Points the bot's webhook at `url`. Returns the Bot API confirmation.
pub async fn configure_webhook<B: BotApi>(
    bot: &B,
    url: &str,
    secret: Option<&str>,
) -> Result<bool, CoreError> {
    let url = url.trim();
    if !(url.starts_with("https://") || url.starts_with("http://")) {
        return Err(CoreError::validation("webhook url must be an http(s) url"));
    }
    let ok = bot.set_webhook(url, secret).await?;
    tracing::info!(url, ok, "webhook configured");
    Ok(ok)
}

pub async fn remove_webhook<B: BotApi>(bot: &B) -> Result<bool, CoreError> {
    let ok = bot.delete_webhook().await?;
    tracing::info!(ok, "webhook removed");
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::{button_external_id, record_delivery};
    use crate::polls::create_poll;
    use crate::testing::{test_pool, BotCall, RecordingBot};
    use crate::updates::{decode_update, Prompt};
    use pollcast_models::poll::{LogicalPoll, PollDelivery};

    const MODERATORS: i64 = -1000;

    async fn lunch(pool: &DbPool, multiple: bool) -> LogicalPoll {
        create_poll(
            pool,
            "Lunch?",
            &["Pizza".into(), "Sushi".into(), "Soup".into()],
            true,
            multiple,
        )
        .await
        .unwrap()
    }

    async fn deliver(pool: &DbPool, poll: &LogicalPoll, external: &str, chat_id: i64) {
        record_delivery(
            pool,
            &PollDelivery {
                logical_poll_id: poll.id.clone(),
                external_poll_id: external.into(),
                chat_id,
                message_id: 1,
            },
        )
        .await
        .unwrap();
    }

    fn user(id: i64) -> User {
        User {
            id,
            username: Some(format!("user{id}")),
            ..Default::default()
        }
    }

    fn poll_answer(external: &str, respondent: i64, indices: &[i32]) -> InboundUpdate {
        InboundUpdate::PollAnswer {
            external_poll_id: external.into(),
            respondent: user(respondent),
            option_indices: indices.to_vec(),
        }
    }

    fn poll_callback(poll_id: &str, respondent: i64, index: i32) -> InboundUpdate {
        InboundUpdate::CallbackPoll {
            callback: Callback {
                query_id: format!("cb-{respondent}"),
                from: user(respondent),
                prompt: Some(Prompt {
                    chat_id: respondent,
                    message_id: 77,
                    text: "Lunch?".into(),
                }),
            },
            logical_poll_id: poll_id.into(),
            option_index: index,
        }
    }

    #[tokio::test]
    async fn native_answers_from_two_chats_aggregate() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, false).await;
        deliver(&pool, &poll, "P1", 100).await;
        deliver(&pool, &poll, "P2", 200).await;

        handle_update(&ctx, poll_answer("P1", 11, &[0])).await.unwrap();
        handle_update(&ctx, poll_answer("P2", 22, &[1])).await.unwrap();

        let results = crate::results::aggregate(&pool, &poll.id).await.unwrap();
        assert_eq!(results.total_responses, 2);
        assert_eq!(results.option_counts, vec![1, 1, 0]);
    }

    #[tokio::test]
    async fn changed_native_answer_replaces_previous() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, false).await;
        deliver(&pool, &poll, "P1", 100).await;

        handle_update(&ctx, poll_answer("P1", 11, &[0])).await.unwrap();
        handle_update(&ctx, poll_answer("P1", 11, &[2])).await.unwrap();

        let results = crate::results::aggregate(&pool, &poll.id).await.unwrap();
        assert_eq!(results.total_responses, 1);
        assert_eq!(results.option_counts, vec![0, 0, 1]);
    }

    #[tokio::test]
    async fn multi_answer_native_poll() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, true).await;
        deliver(&pool, &poll, "P1", 100).await;

        handle_update(&ctx, poll_answer("P1", 11, &[0, 2])).await.unwrap();
        handle_update(&ctx, poll_answer("P1", 22, &[2])).await.unwrap();

        let results = crate::results::aggregate(&pool, &poll.id).await.unwrap();
        assert_eq!(results.total_responses, 2);
        assert_eq!(results.option_counts, vec![1, 0, 2]);
    }

    #[tokio::test]
    async fn empty_native_answer_retracts() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, false).await;
        deliver(&pool, &poll, "P1", 100).await;

        handle_update(&ctx, poll_answer("P1", 11, &[1])).await.unwrap();
        let outcome = handle_update(&ctx, poll_answer("P1", 11, &[])).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::ResponseRetracted { respondent_id: 11, .. }));
        assert_eq!(crate::results::aggregate(&pool, &poll.id).await.unwrap().total_responses, 0);
    }

    #[tokio::test]
    async fn unknown_native_poll_goes_to_dead_letter() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };

        let outcome = handle_update(&ctx, poll_answer("legacy", 11, &[0])).await.unwrap();
        assert_eq!(
            outcome,
            UpdateOutcome::Unresolved { external_poll_id: "legacy".into() }
        );
        let parked = pollcast_db::unresolved_answers::list_unresolved_answers(&pool, 10)
            .await
            .unwrap();
        assert_eq!(parked.len(), 1);
        assert_eq!(parked[0].respondent_id, 11);
        assert!(bot.calls().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_native_answer_is_rejected_not_failed() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, false).await;
        deliver(&pool, &poll, "P1", 100).await;

        let outcome = handle_update(&ctx, poll_answer("P1", 11, &[9])).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn button_answer_records_and_edits_prompt() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: Some(MODERATORS) };
        let poll = lunch(&pool, false).await;
        deliver(&pool, &poll, &button_external_id(&poll.id, 5), 5).await;

        let outcome = handle_update(&ctx, poll_callback(&poll.id, 5, 1)).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::ResponseRecorded { respondent_id: 5, .. }));

        let response = crate::responses::get_response(&pool, &poll.id, 5).await.unwrap().unwrap();
        assert_eq!(response.option_texts, Some(vec!["Sushi".to_string()]));

        let calls = bot.calls();
        assert_eq!(calls.len(), 3);
        assert!(matches!(
            &calls[0],
            BotCall::Message { chat_id: MODERATORS, text, .. } if text.contains("@user5 (ID: 5)") && text.contains("Chose: \"Sushi\"")
        ));
        assert_eq!(
            calls[1],
            BotCall::AnswerCallback {
                query_id: "cb-5".into(),
                text: ANSWER_RECORDED.into(),
                show_alert: false
            }
        );
        assert_eq!(
            calls[2],
            BotCall::Edit {
                chat_id: 5,
                message_id: 77,
                text: "Lunch?\n\n✅ You answered: \"Sushi\"".into()
            }
        );
    }

    #[tokio::test]
    async fn second_button_answer_is_refused() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, false).await;

        handle_update(&ctx, poll_callback(&poll.id, 5, 0)).await.unwrap();
        let outcome = handle_update(&ctx, poll_callback(&poll.id, 5, 2)).await.unwrap();
        assert!(matches!(outcome, UpdateOutcome::AlreadyAnswered { .. }));

        let response = crate::responses::get_response(&pool, &poll.id, 5).await.unwrap().unwrap();
        assert_eq!(response.option_indices, vec![0]);
        assert!(bot.calls().contains(&BotCall::AnswerCallback {
            query_id: "cb-5".into(),
            text: ALREADY_ANSWERED.into(),
            show_alert: true
        }));
    }

    #[tokio::test]
    async fn button_answer_for_missing_poll_or_option() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let poll = lunch(&pool, false).await;

        let missing = handle_update(&ctx, poll_callback("gone", 5, 0)).await.unwrap();
        assert!(matches!(missing, UpdateOutcome::Rejected { .. }));
        let out_of_range = handle_update(&ctx, poll_callback(&poll.id, 5, 7)).await.unwrap();
        assert!(matches!(out_of_range, UpdateOutcome::Rejected { .. }));
        assert!(!crate::responses::has_responded(&pool, &poll.id, 5).await.unwrap());
    }

    #[tokio::test]
    async fn start_subscribes_and_welcomes() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: None };
        let update = decode_update(
            br#"{"update_id": 1, "message": {"message_id": 1, "chat": {"id": 31, "type": "private"},
                "from": {"id": 31, "first_name": "Ana"}, "text": "/start"}}"#,
        )
        .unwrap();

        let outcome = handle_update(&ctx, update).await.unwrap();
        assert_eq!(outcome, UpdateOutcome::Subscribed { chat_id: 31 });
        assert_eq!(crate::subscribers::active_chat_ids(&pool).await.unwrap(), vec![31]);
        assert!(matches!(&bot.calls()[0], BotCall::Message { chat_id: 31, text, .. } if text == WELCOME));
    }

    #[tokio::test]
    async fn generic_button_notifies_moderators() {
        let pool = test_pool().await;
        let bot = RecordingBot::new();
        let ctx = WebhookContext { db: &pool, bot: &bot, notify_chat_id: Some(MODERATORS) };
        let update = decode_update(
            br#"{"update_id": 2, "callback_query": {"id": "cb", "from": {"id": 8},
                "message": {"message_id": 3, "chat": {"id": 8, "type": "private"}, "text": "Join?"},
                "data": "Join?|Yes"}}"#,
        )
        .unwrap();

        assert_eq!(handle_update(&ctx, update).await.unwrap(), UpdateOutcome::ButtonLogged);
        let calls = bot.calls();
        assert!(matches!(
            &calls[0],
            BotCall::Message { chat_id: MODERATORS, text, .. } if text.contains("Pressed: \"Yes\"")
        ));
        assert!(matches!(&calls[2], BotCall::Edit { chat_id: 8, message_id: 3, .. }));
    }

    #[tokio::test]
    async fn webhook_setup_validates_url() {
        let bot = RecordingBot::new();
        assert!(configure_webhook(&bot, "ftp://x", None).await.is_err());
        assert!(configure_webhook(&bot, "https://bot.example.com/api/webhook", Some("s3cret"))
            .await
            .unwrap());
        assert!(remove_webhook(&bot).await.unwrap());
        assert_eq!(
            bot.calls(),
            vec![
                BotCall::SetWebhook {
                    url: "https://bot.example.com/api/webhook".into(),
                    secret: Some("s3cret".into())
                },
                BotCall::DeleteWebhook
            ]
        );
    }
}
