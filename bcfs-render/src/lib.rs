pub mod layout;
pub mod render;
pub mod text;

pub use layout::{BACKGROUND, PanelLayout};
pub use render::{FrameStats, PanelContent, SkiaRenderer, pixmap_from_rgba};
pub use text::{load_font, render_text_pixmap};
