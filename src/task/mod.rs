//! Tasks that make up the firmware as well as the resources and messages they share.
pub mod control;
pub mod display;
pub mod network;
#[macro_use]
pub mod resources;
pub mod rtc;
pub mod settings_store;
pub mod task_messages;
