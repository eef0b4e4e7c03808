//! [`Transport`] backed by the Telegram Bot API

use crate::error::Result;
use crate::messages;
use crate::transport::{
    ChatRef, DownloadedFile, FileRef, Keyboard, MessageRef, OutgoingDocument, Transport,
};
use async_trait::async_trait;
use teloxide::net::Download;
use teloxide::payloads::{SendDocumentSetters, SendMessageSetters};
use teloxide::requests::Requester;
use teloxide::types::{
    ChatAction, ChatId, InlineKeyboardButton, InlineKeyboardMarkup, InputFile, MessageId,
};
use teloxide::{ApiError, Bot, RequestError};
use tracing::debug;

/// Sends and downloads through a teloxide [`Bot`]
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    #[must_use]
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

/// Inline keyboard for a [`Keyboard`] variant
#[must_use]
pub fn keyboard_markup(keyboard: Keyboard) -> InlineKeyboardMarkup {
    match keyboard {
        Keyboard::RemoveBackground => InlineKeyboardMarkup::new(vec![vec![
            InlineKeyboardButton::callback(messages::REMOVE_BG_BUTTON, messages::REMOVE_BG_CALLBACK),
        ]]),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_message(
        &self,
        chat: ChatRef,
        text: &str,
        keyboard: Option<Keyboard>,
    ) -> Result<MessageRef> {
        let mut req = self.bot.send_message(ChatId(chat.0), text);
        if let Some(keyboard) = keyboard {
            req = req.reply_markup(keyboard_markup(keyboard));
        }

        let sent = req.await?;
        Ok(MessageRef {
            chat,
            message_id: sent.id.0,
        })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<()> {
        let result = self
            .bot
            .edit_message_text(ChatId(message.chat.0), MessageId(message.message_id), text)
            .await;

        match result {
            Ok(_) => Ok(()),
            // Same text twice in a row
            Err(RequestError::Api(ApiError::MessageNotModified)) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn send_document(&self, chat: ChatRef, document: OutgoingDocument) -> Result<MessageRef> {
        let input = InputFile::memory(document.bytes).file_name(document.file_name);
        let mut req = self.bot.send_document(ChatId(chat.0), input);
        if let Some(caption) = document.caption {
            req = req.caption(caption);
        }

        let sent = req.await?;
        Ok(MessageRef {
            chat,
            message_id: sent.id.0,
        })
    }

    async fn send_upload_action(&self, chat: ChatRef) -> Result<()> {
        self.bot
            .send_chat_action(ChatId(chat.0), ChatAction::UploadDocument)
            .await?;
        Ok(())
    }

    async fn download(&self, file: &FileRef) -> Result<DownloadedFile> {
        let remote = self.bot.get_file(file.file_id.clone()).await?;

        let mut bytes = Vec::with_capacity(remote.size as usize);
        self.bot.download_file(&remote.path, &mut bytes).await?;
        debug!(path = %remote.path, bytes = bytes.len(), "Downloaded file from Telegram");

        let file_name = remote
            .path
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .map(str::to_string);

        Ok(DownloadedFile { bytes, file_name })
    }
}
