//! Highlight rendering
//!
//! Turns stored highlights into marker spans inside a live [`Document`] and
//! reports clicks on them through an [`EventSink`].
//!
//! [`Document`]: crate::dom::Document

mod events;
mod renderer;
mod session;
mod word;
mod wrap;

pub use events::{EventSink, HighlightEvent, Position};
pub use renderer::{HighlightRenderer, RenderReport, COLOR_PREFERENCE_KEY};
pub use session::{Selection, ViewSession};
pub use word::{locate_word, WordHighlightRenderer};
pub use wrap::{unwrap_all, wrap_range, wrappers, MarkerConfig, WrapSpec};
