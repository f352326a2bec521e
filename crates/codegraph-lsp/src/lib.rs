pub mod client;
pub mod coordinator;
pub mod position;

pub use client::LspClient;
pub use coordinator::LspCoordinator;
pub use position::{LspPosition, LspPositionIndex};
