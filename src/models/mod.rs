pub mod coordinates;
pub mod notification;
pub mod request;
pub mod settings;
