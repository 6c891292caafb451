use std::sync::Arc;

use log::{info, warn};
use teloxide::prelude::*;
use teloxide::types::{KeyboardButton, KeyboardMarkup, UserId};
use teloxide::utils::command::BotCommands;

use crate::controller::Controller;

const WELCOME: &str = "Hi! I can look up instrument prices and keep your favorites.\n\
Pick an action from the menu or use /help.";

const IDLE_HINT: &str = "I wasn't expecting that. Use /menu to pick an action.";

const LABEL_QUOTE: &str = "📈 Get quote";
const LABEL_ADD: &str = "⭐ Add favorite";
const LABEL_DELETE: &str = "🗑 Delete favorite";
const LABEL_LIST: &str = "📋 My favorites";

#[derive(BotCommands, Debug, Clone, Copy, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    #[command(description = "greet and show the menu")]
    Start,
    #[command(description = "show this help")]
    Help,
    #[command(description = "show the menu keyboard")]
    Menu,
    #[command(description = "get the latest price for a ticker")]
    GetStock,
    #[command(description = "add a ticker to your favorites")]
    AddFavorite,
    #[command(description = "remove a ticker from your favorites")]
    DeleteFavorite,
    #[command(description = "list your favorite tickers")]
    MyFavorites,
}

/// Fixed menu whose buttons re-invoke the same command handlers.
fn menu_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new([
        [
            KeyboardButton::new(LABEL_QUOTE),
            KeyboardButton::new(LABEL_ADD),
        ],
        [
            KeyboardButton::new(LABEL_DELETE),
            KeyboardButton::new(LABEL_LIST),
        ],
    ])
    .resize_keyboard()
}

/// Telegram ids are u64 while the store keys users by i64; an id past
/// `i64::MAX` is rejected rather than wrapped.
fn storage_user_id(id: UserId) -> Option<i64> {
    i64::try_from(id.0).ok()
}

fn command_for_label(text: &str) -> Option<Command> {
    match text.trim() {
        LABEL_QUOTE => Some(Command::GetStock),
        LABEL_ADD => Some(Command::AddFavorite),
        LABEL_DELETE => Some(Command::DeleteFavorite),
        LABEL_LIST => Some(Command::MyFavorites),
        _ => None,
    }
}

pub async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    controller: Arc<Controller>,
) -> ResponseResult<()> {
    run_command(&bot, &msg, cmd, &controller).await
}

pub async fn handle_text(
    bot: Bot,
    msg: Message,
    controller: Arc<Controller>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if let Some(cmd) = command_for_label(text) {
        return run_command(&bot, &msg, cmd, &controller).await;
    }

    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user_id) = storage_user_id(user.id) else {
        warn!("text: user id out of range id={}", user.id);
        return Ok(());
    };

    let reply = controller
        .handle_text(user_id, user.username.as_deref(), text)
        .await
        .unwrap_or_else(|| IDLE_HINT.to_string());

    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn run_command(
    bot: &Bot,
    msg: &Message,
    cmd: Command,
    controller: &Controller,
) -> ResponseResult<()> {
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };
    let Some(user_id) = storage_user_id(user.id) else {
        warn!("command: {cmd:?} user id out of range id={}", user.id);
        return Ok(());
    };

    info!("command: {cmd:?} user_id={user_id}");

    match cmd {
        Command::Start => {
            bot.send_message(msg.chat.id, WELCOME)
                .reply_markup(menu_keyboard())
                .await?;
        }
        Command::Menu => {
            bot.send_message(msg.chat.id, "Pick an action:")
                .reply_markup(menu_keyboard())
                .await?;
        }
        Command::Help => {
            bot.send_message(msg.chat.id, Command::descriptions().to_string())
                .await?;
        }
        Command::GetStock => {
            bot.send_message(msg.chat.id, controller.start_quote(user_id).await)
                .await?;
        }
        Command::AddFavorite => {
            bot.send_message(msg.chat.id, controller.start_add(user_id).await)
                .await?;
        }
        Command::DeleteFavorite => {
            bot.send_message(msg.chat.id, controller.start_delete(user_id).await)
                .await?;
        }
        Command::MyFavorites => {
            bot.send_message(msg.chat.id, controller.list_favorites(user_id).await)
                .await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn menu_labels_map_back_to_commands() {
        assert_eq!(command_for_label(LABEL_QUOTE), Some(Command::GetStock));
        assert_eq!(command_for_label(LABEL_ADD), Some(Command::AddFavorite));
        assert_eq!(command_for_label(LABEL_DELETE), Some(Command::DeleteFavorite));
        assert_eq!(command_for_label(LABEL_LIST), Some(Command::MyFavorites));
        assert_eq!(command_for_label("SBER"), None);
    }

    #[test]
    fn user_ids_convert_without_wrapping() {
        assert_eq!(storage_user_id(UserId(42)), Some(42));
        assert_eq!(storage_user_id(UserId(i64::MAX as u64)), Some(i64::MAX));
        assert_eq!(storage_user_id(UserId(u64::MAX)), None);
    }
}
