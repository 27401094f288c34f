pub mod denormalize;
pub mod engine;
pub mod indexing;
pub mod inheritance;
pub mod propagation;
pub mod relationship_index;
pub mod vocabulary;

pub use denormalize::*;
pub use engine::*;
pub use indexing::*;
pub use inheritance::*;
pub use propagation::*;
pub use relationship_index::*;
pub use vocabulary::*;
