mod codec;
mod composer;
mod config;
mod core;
mod cursor;
mod error;
mod ops;
mod paste;
mod plugin;
mod render;
mod text;
mod trigger;
mod value;

pub use crate::codec::*;
pub use crate::composer::*;
pub use crate::config::*;
pub use crate::core::*;
pub use crate::cursor::*;
pub use crate::error::*;
pub use crate::ops::*;
pub use crate::paste::*;
pub use crate::plugin::*;
pub use crate::render::*;
pub use crate::text::Utf16Ext;
pub use crate::trigger::*;
pub use crate::value::*;
