//! HTTP API handlers for zousho-bi

pub mod health;
pub mod lookups;
pub mod series;

pub use health::health_routes;
pub use lookups::lookup_routes;
pub use series::series_routes;
