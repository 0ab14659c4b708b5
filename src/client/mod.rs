//! Client side of the lending API: HTTP gateway, background dispatch and the
//! display cache a user interface renders from

pub mod cache;
pub mod dispatch;
pub mod error;
pub mod gateway;
pub mod retry;

pub use cache::{BookCache, SortKey};
pub use dispatch::{BookCommand, Dispatcher, Outcome};
pub use error::{GatewayError, GatewayResult, Rejection};
pub use gateway::BookGateway;
pub use retry::RetryPolicy;
