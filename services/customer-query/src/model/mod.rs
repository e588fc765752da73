//! Customer data model module.
//!
//! # Purpose
//! Re-exports the customer record and audit event types shared by the API and
//! store layers.
mod customer;
mod event;

pub use customer::Customer;
pub use event::{CustomerEvent, NewCustomerEvent};
