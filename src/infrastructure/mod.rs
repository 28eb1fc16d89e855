pub mod catalog;
pub mod in_memory;
pub mod transport;
