pub mod client;
pub mod history;
pub mod registry;

pub use client::*;
pub use history::*;
pub use registry::*;
