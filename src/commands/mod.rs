pub mod fetch_once;
pub mod serve;

pub use fetch_once::fetch_once;
pub use serve::serve;
