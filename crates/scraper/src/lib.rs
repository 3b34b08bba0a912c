//! Exchange scrapers (§4.3): BSE and NSE feed adapters, a shared
//! fetch-checkpoint-enqueue run-loop, and the local cursor file each binary
//! uses to resume across restarts.

pub mod bse;
pub mod config;
pub mod cursor;
pub mod error;
pub mod feed;
pub mod nse;
pub mod run;

pub use bse::BseFeed;
pub use config::ScraperConfig;
pub use cursor::Cursor;
pub use error::ScraperError;
pub use feed::FetchedItem;
pub use nse::NseFeed;
