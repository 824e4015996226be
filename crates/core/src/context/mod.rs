//! Scoped access contexts and the transactional executor.
//!
//! Every data access runs inside a context established by the
//! [`Executor`]: one transaction, the scope materialized as
//! transaction-local session parameters, and a `SET LOCAL ROLE` switch to
//! the principal matching the user's role. Because everything is `SET
//! LOCAL`, commit or rollback reverts the parameters and the principal
//! before the connection returns to the pool - context never leaks
//! between checkouts.

mod access;
mod executor;
mod session;

pub use access::AccessContext;
pub use executor::Executor;
pub use session::Session;
