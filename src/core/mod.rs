pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::DataType;
pub use value::Value;
