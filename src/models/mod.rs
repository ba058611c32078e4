pub mod description;
pub mod filter;
pub mod options;
pub mod schema;

pub use description::*;
pub use filter::*;
pub use options::*;
pub use schema::*;
