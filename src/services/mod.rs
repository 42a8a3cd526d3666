pub mod ai;
pub mod booking;
pub mod collector;
pub mod conversation;
pub mod directory;
pub mod messaging;
pub mod reminders;
pub mod session;
pub mod slots;
pub mod validators;
