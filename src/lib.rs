pub mod driver;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;

pub use engine::{EngineError, TicketingEngine, Worker};
pub use model::{EngineConfig, Mask, Ticket, TicketId};
