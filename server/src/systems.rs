pub mod arena;
pub mod network;
pub mod storage;
