pub mod ticket;

pub use ticket::{Attachment, Comment, ParseStateError, Ticket, TicketState};
