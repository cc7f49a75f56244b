//! VRChat OSC output
//!
//! Three addresses are used: the chatbox input, the typing indicator and the
//! jump button (pressed and released for the keepalive).

pub mod dispatcher;
pub mod typing;

pub use dispatcher::OscDispatcher;
pub use typing::TypingPulse;

use crate::error::SendError;

pub const ADDR_CHATBOX_INPUT: &str = "/chatbox/input";
pub const ADDR_CHATBOX_TYPING: &str = "/chatbox/typing";
pub const ADDR_INPUT_JUMP: &str = "/input/Jump";

/// Where composed messages and triggers go.
#[allow(async_fn_in_trait)]
pub trait StatusSink {
    /// Commit `text` to the chatbox immediately.
    async fn send_chatbox(&self, text: &str, sound: bool) -> Result<(), SendError>;
    async fn send_typing(&self, on: bool) -> Result<(), SendError>;
    /// Press and release jump.
    async fn send_jump(&self) -> Result<(), SendError>;
}
