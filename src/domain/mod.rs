pub mod admin;
pub mod event;
pub mod order;
pub mod ports;
pub mod product;
pub mod transaction;
pub mod user;
