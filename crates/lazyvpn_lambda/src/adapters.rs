pub mod bucket_store;
pub mod network;
pub mod pause;
