pub mod client;
pub mod config;
pub mod smtp;
pub mod storage;

pub use client::{dot_stuff, submit, SubmitClient};
pub use config::Config;
pub use smtp::{handle_connection, run_session, serve};
pub use storage::{InboxMessage, MailSpool};
