pub mod stage1_map;
pub mod stage2_segment;
pub mod stage3_aggregate;

pub use stage1_map::*;
pub use stage2_segment::*;
pub use stage3_aggregate::*;
