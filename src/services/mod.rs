pub mod attempts;
pub mod gateway;
pub mod poller;
pub mod store;
