pub mod coordinator;
pub mod notifier;
pub mod transport;
