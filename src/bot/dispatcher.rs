//! Message dispatcher setup.
//!
//! Builds the dispatcher with all command, callback and media handlers.

use std::sync::Arc;

use teloxide::adaptors::Throttle;
use teloxide::dispatching::{DefaultKey, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::ReplyParameters;
use tracing::warn;

use crate::config::Config;
use crate::database::{
    Database, DumpChannelRepository, HistoryRepository, RateLimitRepository, SettingsRepository,
    TemplateRepository, UserProfile, UserRepo,
};
use crate::events;
use crate::media::FilePipeline;
use crate::permissions::Permissions;
use crate::plugins;
use crate::session::{JobTracker, SessionStore};

/// Bot type with Throttle adaptor for automatic rate limiting.
pub type ThrottledBot = Throttle<Bot>;

const BANNED_NOTICE: &str = "🚫 You are banned from using this bot.";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,

    /// User repository for tracking users and their flags.
    pub users: Arc<UserRepo>,

    pub settings: Arc<SettingsRepository>,
    pub templates: Arc<TemplateRepository>,
    pub dumps: Arc<DumpChannelRepository>,
    pub history: Arc<HistoryRepository>,
    pub rate_limits: Arc<RateLimitRepository>,

    /// Role and ban checks with caching.
    pub permissions: Permissions,

    /// Pending multi-step inputs.
    pub sessions: SessionStore,

    /// Running rename jobs, one per user.
    pub jobs: JobTracker,

    pub pipeline: Arc<FilePipeline>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(bot: ThrottledBot, db: &Database, config: Arc<Config>) -> Self {
        let users = Arc::new(UserRepo::new(db, &config.default_format));
        let settings = Arc::new(SettingsRepository::new(db, &config.default_format));
        let templates = Arc::new(TemplateRepository::new(db));
        let dumps = Arc::new(DumpChannelRepository::new(db));
        let history = Arc::new(HistoryRepository::new(db));
        let rate_limits = Arc::new(RateLimitRepository::new(
            db,
            config.rate_limit_requests,
            config.rate_limit_window,
        ));
        let permissions = Permissions::new(Arc::clone(&users), &config.owner_ids);
        let pipeline = Arc::new(FilePipeline::new(
            bot,
            Arc::clone(&config),
            Arc::clone(&history),
            Arc::clone(&dumps),
        ));

        Self {
            config,
            users,
            settings,
            templates,
            dumps,
            history,
            rate_limits,
            permissions,
            sessions: SessionStore::new(),
            jobs: JobTracker::new(),
            pipeline,
        }
    }

    /// Check if a user is a bot owner.
    pub fn is_owner(&self, user_id: u64) -> bool {
        self.config.is_owner(user_id)
    }
}

/// Build the dispatcher with all handlers.
pub fn build_dispatcher(
    bot: ThrottledBot,
    state: AppState,
) -> Dispatcher<ThrottledBot, anyhow::Error, DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![state])
        .default_handler(|_| async {})
        .error_handler(LoggingErrorHandler::with_custom_text(
            "An error has occurred in the dispatcher",
        ))
        .enable_ctrlc_handler()
        .build()
}

/// Build the handler schema.
fn schema() -> UpdateHandler<anyhow::Error> {
    use teloxide::dispatching::UpdateFilterExt;

    // Private chats only: track the user, refuse banned users, then route
    let message_handler = Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .inspect_async(track_user)
        .branch(dptree::filter_async(message_from_banned).endpoint(refuse_message))
        .branch(plugins::command_handler())
        .branch(events::message_handler());

    let callback_handler = Update::filter_callback_query()
        .inspect_async(track_callback_user)
        .branch(dptree::filter_async(callback_from_banned).endpoint(refuse_callback))
        .branch(plugins::callback_handler());

    dptree::entry()
        .branch(message_handler)
        .branch(callback_handler)
}

/// Track user from message (runs before all handlers).
async fn track_user(msg: Message, state: AppState) {
    if let Some(user) = msg.from.as_ref() {
        Arc::clone(&state.users).upsert_background(UserProfile::from_telegram(user));
    }
}

async fn track_callback_user(q: CallbackQuery, state: AppState) {
    Arc::clone(&state.users).upsert_background(UserProfile::from_telegram(&q.from));
}

async fn is_banned(state: &AppState, user_id: u64) -> bool {
    match state.permissions.is_banned(user_id).await {
        Ok(banned) => banned,
        Err(e) => {
            warn!("Ban check failed for {}: {:#}", user_id, e);
            false
        }
    }
}

async fn message_from_banned(msg: Message, state: AppState) -> bool {
    match msg.from.as_ref() {
        Some(user) => is_banned(&state, user.id.0).await,
        None => false,
    }
}

async fn callback_from_banned(q: CallbackQuery, state: AppState) -> bool {
    is_banned(&state, q.from.id.0).await
}

async fn refuse_message(bot: ThrottledBot, msg: Message) -> anyhow::Result<()> {
    bot.send_message(msg.chat.id, BANNED_NOTICE)
        .reply_parameters(ReplyParameters::new(msg.id))
        .await?;
    Ok(())
}

async fn refuse_callback(bot: ThrottledBot, q: CallbackQuery) -> anyhow::Result<()> {
    bot.answer_callback_query(q.id)
        .text(BANNED_NOTICE)
        .show_alert(true)
        .await?;
    Ok(())
}

/// State over an in-memory database, owner id 1. Needs a tokio runtime.
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use teloxide::adaptors::throttle::Limits;

    let config = Config::from_lookup(|key| match key {
        "BOT_TOKEN" => Some("123456:TEST".to_string()),
        "OWNER_ID" => Some("1".to_string()),
        _ => None,
    })
    .unwrap();
    let db = Database::in_memory().unwrap();
    let bot = Bot::new(&config.bot_token).throttle(Limits::default());

    AppState::new(bot, &db, Arc::new(config))
}
