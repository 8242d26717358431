pub mod kv;
pub mod memory;

pub use kv::kv_pair::{Key, KeyValuePair, Value};
pub use memory::skiplist::{DeleteOutcome, InsertOutcome, LevelListing, SkipListIndex};
pub use memory::skiplist_options::SkipListOptions;
