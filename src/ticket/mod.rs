//! Support tickets
//!
//! A panel message carries a button that opens a private channel for the
//! member who pressed it. Staff claim, close or delete tickets with the buttons
//! posted in the channel or the `ticket` commands; lifecycle steps go to the
//! configured log channel.

pub mod actions;
mod closer;
mod desk;
pub mod settings;

pub use actions::{Clicker, TicketAction, TicketEvent, log_line};
pub use closer::{CLOSE_DELAY, TicketCloser};
pub use desk::{
    OpenOutcome, PANEL_REASON, TicketDesk, channel_transcript, handle_interaction, log_event,
    open_ticket, send_panel,
};
pub use settings::{TicketSettings, ticket_opener};
