pub mod admin;
pub mod scan;
pub mod ticket;

pub use admin::Admin;
pub use scan::{ScanOutcome, ScanRecord};
pub use ticket::{Ticket, TicketCategory, TicketStats, TicketStatus};
