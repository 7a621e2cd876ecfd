//! Domain models for the patient chat.

mod appointment;
mod message;
mod patient;

pub use appointment::*;
pub use message::*;
pub use patient::*;
