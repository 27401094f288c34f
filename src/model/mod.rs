pub mod common;
pub mod entity;
pub mod index;
pub mod propagation;
pub mod template;
pub mod thesaurus;
pub mod user_context;

pub use common::*;
pub use entity::*;
pub use index::*;
pub use propagation::*;
pub use template::*;
pub use thesaurus::*;
pub use user_context::*;
