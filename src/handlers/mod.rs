pub mod callback;
pub mod subscription;
pub mod text;
pub mod ui;

pub use callback::callback_handler;
pub use subscription::TelegramChannel;
pub use text::text_handler;

pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
