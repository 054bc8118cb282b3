//! Non-command message handlers: media uploads, photos and free text.
//!
//! Add new event handlers by:
//! 1. Creating a new file in this directory
//! 2. Adding `pub mod your_event;` below
//! 3. Adding the handler to `message_handler()`

pub mod media;
pub mod photo;
pub mod text;

use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;

use crate::media::IncomingFile;

/// Build the message event handler. Runs after the command handler.
pub fn message_handler() -> UpdateHandler<anyhow::Error> {
    dptree::entry()
        .branch(dptree::filter_map(|msg: Message| IncomingFile::from_message(&msg)).endpoint(media::media_handler))
        .branch(dptree::filter(|msg: Message| msg.photo().is_some()).endpoint(photo::photo_handler))
        .branch(dptree::filter(|msg: Message| msg.text().is_some()).endpoint(text::text_handler))
}
