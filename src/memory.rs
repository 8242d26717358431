pub mod skiplist;
pub mod skiplist_options;
