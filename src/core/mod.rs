pub mod geo;
pub mod waypoint;

pub use geo::LatLng;
pub use waypoint::{Route, RouteError, Waypoint};
