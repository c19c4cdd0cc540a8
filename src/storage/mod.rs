pub mod inbox;
pub mod spool;

pub use inbox::InboxMessage;
pub use spool::{sanitize, MailSpool, SpoolName};
