mod dir_store;
mod map_store;

pub use dir_store::DirStore;
pub use map_store::MapStore;
