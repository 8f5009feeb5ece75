pub mod chunk;
pub mod mapping;
pub mod meeting;
pub mod record;

pub use chunk::*;
pub use mapping::*;
pub use meeting::*;
pub use record::*;
