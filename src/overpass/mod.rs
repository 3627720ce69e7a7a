pub mod client;
pub mod query;
pub mod regional;
pub mod transport;

pub use client::{FetchOutcome, OverpassClient, MAX_RECURSION_DEPTH};
pub use query::AreaFilter;
pub use regional::{region_download, RegionDownloadReport, RegionShape};
pub use transport::{HttpTransport, QueryTransport};
