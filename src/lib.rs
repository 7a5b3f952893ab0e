pub mod chat_api;
pub mod gui;
pub mod render;
pub mod session;
pub mod transcript;
