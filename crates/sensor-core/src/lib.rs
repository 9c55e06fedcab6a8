pub mod error;
pub mod fields;
pub mod traits;
pub mod types;

pub use error::*;
pub use fields::*;
pub use traits::*;
pub use types::*;
