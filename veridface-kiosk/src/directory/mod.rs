pub mod client;
pub mod types;

pub use client::{DirectoryClient, UserPager};
pub use types::{ActivityEntry, DashboardSummary, DirectoryError, DirectoryUser, HeatmapRow};
