//! Imports for syntax extensions.

pub use crate::Error as _;
pub use crate::exchange::Exchange as _;
pub use crate::request::ExchangeRequest as _;
