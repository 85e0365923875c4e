//! Venue integrations for the spread sniper.
//!
//! ## Paradex
//! REST connectivity for:
//! - Session management (JWT, renewed before expiry)
//! - Market data (top of book, instrument metadata)
//! - Account operations (balance, positions, orders)
//!
//! ## Paper
//! In-process simulated venue used for dry runs and tests.

mod error;
pub mod mock;
pub mod paradex;
mod traits;
mod types;

pub use error::VenueError;
pub use mock::{PaperAccountState, PaperPosition, PaperVenueClient};
pub use paradex::ParadexClient;
pub use traits::{VenueClient, VenueResult};
pub use types::*;
