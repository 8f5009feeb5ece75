pub mod embeddings;
pub mod relational;
pub mod vector;

pub use embeddings::*;
pub use relational::*;
pub use vector::*;
