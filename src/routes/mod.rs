pub mod default_route;
pub mod diagnose_route;
pub mod premium_route;
