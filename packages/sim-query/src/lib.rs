//! Query helpers shared by simulated services.
//!
//! * [`filter`] - chat-style filter expressions, equality filters and pagination
//! * [`search`] - in-memory text search strategies over store records
//! * [`geo`] - great-circle distance and radius queries

pub mod filter;
pub mod geo;
pub mod search;

pub use filter::{
    apply_filters, list_page, list_page_with, matches_filter, parse_filter, MessageFilter, OrderBy,
    Page, PageLimits,
};
pub use geo::{haversine_distance, nearby, Circle, LatLng};
pub use search::{SearchEngine, SearchStrategy, SearchableDocument, StrategyKind};
