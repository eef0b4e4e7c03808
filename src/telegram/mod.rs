//! Telegram front end
//!
//! Maps updates onto [`RequestWorkflow`] operations. Image requests run in
//! their own task so that a second image or a `/cancel` from the same chat is
//! seen while the first request is still in flight.

pub mod transport;

pub use transport::TelegramTransport;

use crate::error::{BotError, Result};
use crate::messages;
use crate::outcome::{image_content_type_for_name, is_image_content_type};
use crate::transport::FileRef;
use crate::workflow::{Requester, RequestWorkflow};
use std::sync::Arc;
use teloxide::dispatching::{UpdateFilterExt, UpdateHandler};
use teloxide::dptree;
use teloxide::requests::Requester as _;
use teloxide::types::{CallbackQuery, Message, Update};
use teloxide::utils::command::BotCommands;
use teloxide::Bot;
use tracing::{debug, Instrument};

/// Commands shown in the Telegram menu
#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "These commands are supported:")]
pub enum Command {
    #[command(description = "show the welcome message")]
    Start,
    #[command(description = "remove the background from the next photo you send")]
    RemoveBg,
    #[command(description = "forget a pending /removebg")]
    Cancel,
    #[command(description = "show help")]
    Help,
}

type HandlerResult = std::result::Result<(), BotError>;

/// Update handler tree for the dispatcher
///
/// Expects an `Arc<RequestWorkflow>` among the dispatcher dependencies.
#[must_use]
pub fn schema() -> UpdateHandler<BotError> {
    let commands = teloxide::filter_command::<Command, _>()
        .branch(dptree::case![Command::Start].endpoint(on_start))
        .branch(dptree::case![Command::RemoveBg].endpoint(on_remove_bg))
        .branch(dptree::case![Command::Cancel].endpoint(on_cancel))
        .branch(dptree::case![Command::Help].endpoint(on_help));

    let messages = Update::filter_message()
        .branch(commands)
        .branch(dptree::filter_map(|msg: Message| image_file(&msg)).endpoint(on_image))
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(on_text))
        .branch(dptree::endpoint(on_other));

    let callbacks = Update::filter_callback_query().endpoint(on_callback);

    dptree::entry().branch(messages).branch(callbacks)
}

/// Sender of a message, or `None` for anonymous channel posts
#[must_use]
pub fn requester_of(msg: &Message) -> Option<Requester> {
    msg.from
        .as_ref()
        .map(|user| Requester::new(user.id.0, msg.chat.id.0))
}

/// The image carried by a message, if any
///
/// Photos use their largest size. Documents count when their MIME type is
/// `image/*` or, lacking one, their name has an image extension.
#[must_use]
pub fn image_file(msg: &Message) -> Option<FileRef> {
    if let Some(sizes) = msg.photo() {
        let largest = sizes
            .iter()
            .max_by_key(|size| u64::from(size.width) * u64::from(size.height))?;
        return Some(
            FileRef::new(largest.file.id.clone())
                .with_file_name(format!("photo_{}.jpg", largest.file.unique_id)),
        );
    }

    let document = msg.document()?;
    let is_image = match &document.mime_type {
        Some(mime) => is_image_content_type(mime.essence_str()),
        None => document
            .file_name
            .as_deref()
            .is_some_and(has_image_extension),
    };
    if !is_image {
        return None;
    }

    let file = FileRef::new(document.file.id.clone());
    Some(match &document.file_name {
        Some(name) => file.with_file_name(name.clone()),
        None => file,
    })
}

fn has_image_extension(name: &str) -> bool {
    image_content_type_for_name(name).is_some()
}

/// Sender of a button press, answered in the chat holding the button
///
/// Falls back to the sender's private chat when the message is unavailable.
#[must_use]
pub fn requester_of_callback(query: &CallbackQuery) -> Requester {
    let user_id = query.from.id.0;
    let chat = query
        .message
        .as_ref()
        .map_or_else(|| i64::try_from(user_id).unwrap_or_default(), |m| m.chat().id.0);
    Requester::new(user_id, chat)
}

/// Route a handler error through the fault path
async fn settle<T>(workflow: &RequestWorkflow, requester: Requester, result: Result<T>) -> HandlerResult {
    if let Err(e) = result {
        workflow.handle_fault(Some(requester), &e).await;
    }
    Ok(())
}

async fn on_start(workflow: Arc<RequestWorkflow>, msg: Message) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };
    settle(&workflow, requester, workflow.greet(requester).await).await
}

async fn on_remove_bg(workflow: Arc<RequestWorkflow>, msg: Message) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };
    settle(&workflow, requester, workflow.arm(requester).await).await
}

async fn on_cancel(workflow: Arc<RequestWorkflow>, msg: Message) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };
    settle(&workflow, requester, workflow.cancel(requester).await).await
}

async fn on_help(workflow: Arc<RequestWorkflow>, msg: Message) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };
    settle(&workflow, requester, workflow.help(requester).await).await
}

async fn on_text(workflow: Arc<RequestWorkflow>, msg: Message) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };
    settle(&workflow, requester, workflow.handle_text(requester).await).await
}

async fn on_other(workflow: Arc<RequestWorkflow>, msg: Message) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };
    settle(&workflow, requester, workflow.reject_non_image(requester).await).await
}

async fn on_image(workflow: Arc<RequestWorkflow>, msg: Message, file: FileRef) -> HandlerResult {
    let Some(requester) = requester_of(&msg) else {
        return Ok(());
    };

    tokio::spawn(
        async move {
            let result = workflow.handle_image(requester, file).await;
            settle(&workflow, requester, result).await
        }
        .in_current_span(),
    );
    Ok(())
}

async fn on_callback(bot: Bot, workflow: Arc<RequestWorkflow>, query: CallbackQuery) -> HandlerResult {
    // Answer first so the client stops showing a spinner on the button.
    if let Err(e) = bot.answer_callback_query(query.id.clone()).await {
        debug!(error = %e, "Could not answer callback query");
    }

    if query.data.as_deref() != Some(messages::REMOVE_BG_CALLBACK) {
        debug!(data = ?query.data, "Ignoring unknown callback");
        return Ok(());
    }

    let requester = requester_of_callback(&query);
    settle(&workflow, requester, workflow.arm(requester).await).await
}
