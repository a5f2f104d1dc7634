pub mod llm;
pub mod prompts;
pub mod session;

pub use session::{
    Change, ExchangeEvent, ExchangeEventKind, ExchangeId, ExchangeTicket, IngestError, Message,
    MessageId, MessageState, Role, Session, Status,
};
