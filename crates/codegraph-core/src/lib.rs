pub mod config;
pub mod error;
pub mod node;
pub mod shared;
pub mod traits;
pub mod types;

pub use config::*;
pub use error::*;
pub use node::*;
pub use shared::*;
pub use traits::*;
pub use types::*;
