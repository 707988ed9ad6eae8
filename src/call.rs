//! Inbound call objects handed to handlers.
//!
//! Every inbound request becomes an [`ApiCall`], every inbound notification
//! a [`MsgCall`]. Both live only as long as the handler keeps them.

mod api;
mod msg;

pub use api::{ApiCall, ReplyOutcome};
pub use msg::MsgCall;
