pub mod palette;
pub mod config;
pub mod rules;
pub mod dom;
pub mod context;
pub mod matcher;
pub mod overlay;
pub mod navigator;
pub mod watcher;
pub mod engine;
pub mod wasm;

pub use palette::*;
pub use config::*;
pub use rules::*;
pub use dom::*;
pub use context::*;
pub use matcher::*;
pub use overlay::*;
pub use navigator::*;
pub use watcher::*;
pub use engine::*;
pub use wasm::*;

#[cfg(test)]
mod tests;
