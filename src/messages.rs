//! User-facing texts

/// Callback data carried by the "Remove BG" button
pub const REMOVE_BG_CALLBACK: &str = "remove_bg";

/// Label of the "Remove BG" button
pub const REMOVE_BG_BUTTON: &str = "🪄 Remove BG";

pub const WELCOME: &str = "👋 Hi! I remove backgrounds from photos.\n\n\
Tap the button below (or send /removebg), then send me a photo. \
For the best quality, send it as a file instead of a compressed photo.";

pub const HELP: &str = "Commands:\n\
/removebg - remove the background from the next photo you send\n\
/cancel - forget a pending /removebg\n\
/help - show this message\n\n\
The result comes back as a PNG file with a transparent background.";

pub const ARMED: &str = "📸 Send me the photo whose background you want removed.";

pub const ALREADY_ARMED: &str = "📸 I'm ready: just send the photo.";

pub const BUSY: &str = "⏳ I'm still working on your previous photo. Please wait for the result.";

pub const NOT_ARMED: &str = "👆 Tap \"Remove BG\" or send /removebg first, then send the photo.";

pub const CANCELLED: &str = "👌 Cancelled. Send /removebg whenever you want to try again.";

pub const NOTHING_TO_CANCEL: &str = "There is nothing to cancel.";

pub const NOT_AN_IMAGE: &str = "🤔 That file doesn't look like an image. Please send a JPG, PNG or WebP picture.";

pub const SEND_PHOTO_HINT: &str = "📸 Waiting for a photo. Send /cancel to stop.";

pub const UNRECOGNIZED: &str = "Send /removebg to get started, or /help for more.";

pub const STATUS_STARTED: &str = "🪄 Removing background...";

pub const SUCCESS_CAPTION: &str = "✅ Background removed!";

pub const STATUS_DONE: &str = "✅ Done";

pub const STATUS_FAILED: &str = "❌ Failed";

pub const UPLOAD_FAILED: &str = "❌ The background was removed, but I couldn't upload the result. Tap /removebg and try again.";

pub const FAULT_APOLOGY: &str = "⚠️ Sorry, something went wrong. Tap /removebg and send the photo again.";

/// Appended to every failure message
pub const RETRY_HINT: &str = "Tap /removebg and send the photo again.";
