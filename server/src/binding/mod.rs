//! Account Bindings
//!
//! One chat account holds at most one game account and one game account is
//! held by at most one chat account. The binding store and the game server's
//! allow-list are changed together or not at all.

mod error;
mod linking;
mod service;

pub use error::{BindError, BindResult};
pub use linking::{validate_name, AccountLinker, Linked};
pub use service::{AllowListEffects, BindOutcome, BindingService};
