//! Text rendering: progress bars, templates, message composition
//!
//! Pure functions only; nothing here touches the network or the clock
//! except through arguments.

pub mod bar;
pub mod compose;
pub mod template;
pub mod text;

pub use compose::{clock_line, compose_message, Extras};
pub use template::render_lines;
