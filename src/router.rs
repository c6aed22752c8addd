use std::sync::Arc;

use anyhow::Result;
use teloxide::types::{InlineKeyboardMarkup, ReplyMarkup};
use teloxide::utils::command::BotCommands;

use crate::admins::AdminRegistry;
use crate::commands::Command;
use crate::conversation::{complete_step, ConversationState, ConversationStore};
use crate::gate::SubscriptionGate;
use crate::handlers::ui::{
    admin_panel_keyboard, channel_link, download_markup, join_channel_markup, main_keyboard, post_link,
    BTN_ADD_ADMIN, BTN_ADD_CODE, BTN_ADMIN_PANEL, BTN_ADVERTISE, BTN_BACK, BTN_LIST_CODES,
    BTN_REMOVE_CODE, BTN_SPONSORSHIP, BTN_STATS, CHECK_SUB_CALLBACK,
};
use crate::registry::{ContentLocator, RegistryStore};

const NOT_ADMIN: &str = "⛔ You are not an admin!";
const SOMETHING_WENT_WRONG: &str = "⚠️ Something went wrong, please try again later.";

/// Fixed-label buttons of the reply keyboards.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MenuAction {
    Advertise,
    Sponsorship,
    AdminPanel,
    Back,
    AddCode,
    ListCodes,
    RemoveCode,
    Statistics,
    AddAdmin,
}

impl MenuAction {
    fn admin_only(self) -> bool {
        !matches!(self, MenuAction::Advertise | MenuAction::Sponsorship | MenuAction::Back)
    }
}

const MENU_ROUTES: [(&str, MenuAction); 9] = [
    (BTN_ADVERTISE, MenuAction::Advertise),
    (BTN_SPONSORSHIP, MenuAction::Sponsorship),
    (BTN_ADMIN_PANEL, MenuAction::AdminPanel),
    (BTN_BACK, MenuAction::Back),
    (BTN_ADD_CODE, MenuAction::AddCode),
    (BTN_LIST_CODES, MenuAction::ListCodes),
    (BTN_REMOVE_CODE, MenuAction::RemoveCode),
    (BTN_STATS, MenuAction::Statistics),
    (BTN_ADD_ADMIN, MenuAction::AddAdmin),
];

/// Where an idle user's text message goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Command(Command),
    Menu(MenuAction),
    Redeem(String),
    Unmatched,
}

/// Classifies text from a user with no pending conversation. First match
/// wins: bot commands, then exact menu labels, then all-digit codes.
pub fn classify_text(text: &str, bot_username: &str) -> Route {
    if let Ok(cmd) = Command::parse(text, bot_username) {
        return Route::Command(cmd);
    }
    if let Some((_, action)) = MENU_ROUTES.iter().find(|(label, _)| *label == text) {
        return Route::Menu(*action);
    }
    let code = text.trim();
    if !code.is_empty() && code.chars().all(|c| c.is_ascii_digit()) {
        return Route::Redeem(code.to_string());
    }
    Route::Unmatched
}

/// Something to deliver to the chat the event came from.
#[derive(Clone, Debug)]
pub enum Reply {
    Text {
        text: String,
        markup: Option<ReplyMarkup>,
    },
    /// Copy a channel post into the chat.
    Content {
        locator: ContentLocator,
        markup: Option<InlineKeyboardMarkup>,
    },
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            markup: None,
        }
    }

    fn with_markup(text: impl Into<String>, markup: impl Into<ReplyMarkup>) -> Self {
        Reply::Text {
            text: text.into(),
            markup: Some(markup.into()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackReply {
    /// Replace the text of the message carrying the button.
    EditText(String),
    Alert(String),
    Acknowledge,
}

pub struct RouterSettings {
    pub bot_username: String,
    pub advertise_contact: String,
    pub sponsor_card: String,
    pub link_domain: String,
}

pub struct Router {
    registry: Arc<dyn RegistryStore>,
    admins: Arc<AdminRegistry>,
    gate: Arc<SubscriptionGate>,
    conversations: Arc<ConversationStore>,
    settings: RouterSettings,
}

impl Router {
    pub fn new(
        registry: Arc<dyn RegistryStore>,
        admins: Arc<AdminRegistry>,
        gate: Arc<SubscriptionGate>,
        conversations: Arc<ConversationStore>,
        settings: RouterSettings,
    ) -> Self {
        Self {
            registry,
            admins,
            gate,
            conversations,
            settings,
        }
    }

    /// Handles one text message. `None` means the message is ignored.
    pub async fn handle_text(&self, user_id: i64, text: &str) -> Option<Reply> {
        match self.dispatch_text(user_id, text).await {
            Ok(reply) => reply,
            Err(e) => {
                log::error!("Failed to handle message from {}: {:#}", user_id, e);
                Some(Reply::text(SOMETHING_WENT_WRONG))
            }
        }
    }

    async fn dispatch_text(&self, user_id: i64, text: &str) -> Result<Option<Reply>> {
        // A pending flow swallows the message whatever it says.
        let pending = self.conversations.take(user_id).await;
        if pending != ConversationState::Idle {
            log::debug!("User {} completes {:?}", user_id, pending);
            let reply = complete_step(
                pending,
                text,
                self.gate.channel(),
                self.registry.as_ref(),
                &self.admins,
            )
            .await?;
            return Ok(reply.map(Reply::text));
        }

        match classify_text(text, &self.settings.bot_username) {
            Route::Command(Command::Start) => self.start(user_id).await.map(Some),
            Route::Command(Command::Help) => Ok(Some(Reply::text(Command::descriptions().to_string()))),
            Route::Menu(action) => self.menu(user_id, action).await.map(Some),
            Route::Redeem(code) => self.redeem(user_id, &code).await.map(Some),
            Route::Unmatched => Ok(None),
        }
    }

    async fn start(&self, user_id: i64) -> Result<Reply> {
        if let Err(e) = self.registry.save_user(user_id).await {
            log::error!("Failed to register user {}: {:#}", user_id, e);
        }

        if self.gate.is_subscribed(user_id).await {
            let is_admin = self.admins.is_admin(user_id).await;
            return Ok(Reply::with_markup("✅ Subscribed. Send a code:", main_keyboard(is_admin)));
        }

        let channel_url = match channel_link(&self.settings.link_domain, self.gate.channel()) {
            Ok(url) => Some(url),
            Err(e) => {
                log::warn!("Cannot build channel link for {}: {}", self.gate.channel(), e);
                None
            }
        };
        Ok(Reply::with_markup(
            "❗ Please subscribe to the channel:",
            join_channel_markup(channel_url),
        ))
    }

    async fn menu(&self, user_id: i64, action: MenuAction) -> Result<Reply> {
        let is_admin = self.admins.is_admin(user_id).await;
        if action.admin_only() && !is_admin {
            log::info!("User {} tried admin action {:?}", user_id, action);
            return Ok(Reply::text(NOT_ADMIN));
        }

        let reply = match action {
            MenuAction::Advertise => {
                Reply::text(format!("For advertising: {}", self.settings.advertise_contact))
            }
            MenuAction::Sponsorship => {
                Reply::text(format!("Card for sponsorship: {}", self.settings.sponsor_card))
            }
            MenuAction::AdminPanel => {
                Reply::with_markup("👮 Welcome to the admin panel!", admin_panel_keyboard())
            }
            MenuAction::Back => Reply::with_markup("🏠 Back to the main menu.", main_keyboard(is_admin)),
            MenuAction::AddCode => self.begin_flow(user_id, ConversationState::AwaitingCodeAdd).await,
            MenuAction::RemoveCode => self.begin_flow(user_id, ConversationState::AwaitingCodeRemoval).await,
            MenuAction::AddAdmin => self.begin_flow(user_id, ConversationState::AwaitingAdminId).await,
            MenuAction::ListCodes => {
                let codes = self.registry.list_codes().await?;
                if codes.is_empty() {
                    Reply::text("📂 No codes yet.")
                } else {
                    let mut text = String::from("📄 Codes list:\n");
                    for (code, locator) in &codes {
                        text.push_str(&format!("🔢 {} — ID: {}\n", code, locator.content_id));
                    }
                    Reply::text(text)
                }
            }
            MenuAction::Statistics => self.statistics().await,
        };
        Ok(reply)
    }

    async fn begin_flow(&self, user_id: i64, state: ConversationState) -> Reply {
        self.conversations.begin(user_id, state).await;
        Reply::text(state.prompt().unwrap_or_default())
    }

    async fn statistics(&self) -> Reply {
        let stats = async {
            let subscribers = self.gate.subscriber_count().await?;
            let codes = self.registry.count_codes().await?;
            let users = self.registry.count_users().await?;
            anyhow::Ok((subscribers, codes, users))
        };

        match stats.await {
            Ok((subscribers, codes, users)) => Reply::text(format!(
                "📊 Subscribers: {}\n📦 Codes: {}\n👥 Users: {}",
                subscribers, codes, users
            )),
            Err(e) => {
                log::error!("Stats error: {:#}", e);
                Reply::text("⚠️ Could not fetch statistics!")
            }
        }
    }

    async fn redeem(&self, user_id: i64, code: &str) -> Result<Reply> {
        if !self.gate.is_subscribed(user_id).await {
            return Ok(Reply::text("❗ Subscribe to the channel first to use codes."));
        }

        let Some(locator) = self.registry.find_code(code).await? else {
            log::debug!("User {} asked for unknown code {}", user_id, code);
            return Ok(Reply::text("❌ No such code found. Please send a valid code."));
        };

        let markup = match post_link(&self.settings.link_domain, &locator.channel, locator.content_id) {
            Ok(url) => Some(download_markup(url)),
            Err(e) => {
                log::warn!("Cannot build post link for code {}: {}", code, e);
                None
            }
        };
        log::info!("User {} redeemed code {}", user_id, code);
        Ok(Reply::Content { locator, markup })
    }

    pub async fn handle_callback(&self, user_id: i64, data: &str) -> CallbackReply {
        match data {
            CHECK_SUB_CALLBACK => {
                if self.gate.is_subscribed(user_id).await {
                    CallbackReply::EditText("✅ Subscription confirmed. Send a code.".to_string())
                } else {
                    CallbackReply::Alert("❗ You are still not subscribed!".to_string())
                }
            }
            other => {
                log::debug!("Ignoring callback data {:?} from {}", other, user_id);
                CallbackReply::Acknowledge
            }
        }
    }
}
