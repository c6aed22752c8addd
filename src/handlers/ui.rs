use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};
use url::Url;

pub const BTN_ADVERTISE: &str = "📢 Advertise";
pub const BTN_SPONSORSHIP: &str = "💼 Sponsorship";
pub const BTN_ADMIN_PANEL: &str = "🛠 Admin panel";
pub const BTN_BACK: &str = "🔙 Back";

pub const BTN_ADD_CODE: &str = "➕ Add code";
pub const BTN_LIST_CODES: &str = "📄 Codes list";
pub const BTN_REMOVE_CODE: &str = "❌ Remove code";
pub const BTN_STATS: &str = "📊 Statistics";
pub const BTN_ADD_ADMIN: &str = "👤 Add admin";

pub const CHECK_SUB_CALLBACK: &str = "check_sub";

pub fn main_keyboard(is_admin: bool) -> KeyboardMarkup {
    let mut rows = vec![vec![
        KeyboardButton::new(BTN_ADVERTISE),
        KeyboardButton::new(BTN_SPONSORSHIP),
    ]];

    if is_admin {
        rows.push(vec![KeyboardButton::new(BTN_ADMIN_PANEL)]);
    }

    KeyboardMarkup::new(rows).resize_keyboard()
}

pub fn admin_panel_keyboard() -> KeyboardMarkup {
    KeyboardMarkup::new(vec![
        vec![KeyboardButton::new(BTN_ADD_CODE), KeyboardButton::new(BTN_LIST_CODES)],
        vec![KeyboardButton::new(BTN_REMOVE_CODE), KeyboardButton::new(BTN_STATS)],
        vec![KeyboardButton::new(BTN_ADD_ADMIN), KeyboardButton::new(BTN_BACK)],
    ])
    .resize_keyboard()
}

/// `https://<domain>/<channel>` with the leading `@` of a channel username dropped.
pub fn channel_link(domain: &str, channel: &str) -> Result<Url, url::ParseError> {
    Url::parse(&format!("https://{}/{}", domain, channel.trim_start_matches('@')))
}

pub fn post_link(domain: &str, channel: &str, content_id: i32) -> Result<Url, url::ParseError> {
    Url::parse(&format!(
        "https://{}/{}/{}",
        domain,
        channel.trim_start_matches('@'),
        content_id
    ))
}

pub fn join_channel_markup(channel_url: Option<Url>) -> InlineKeyboardMarkup {
    let mut rows = Vec::new();
    if let Some(url) = channel_url {
        rows.push(vec![InlineKeyboardButton::url("Channel", url)]);
    }
    rows.push(vec![InlineKeyboardButton::callback("✅ Check", CHECK_SUB_CALLBACK)]);
    InlineKeyboardMarkup::new(rows)
}

pub fn download_markup(post_url: Url) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![InlineKeyboardButton::url("📥 Download", post_url)]])
}
