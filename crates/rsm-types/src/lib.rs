pub mod design;
pub mod model;
pub mod errors;

pub use design::*;
pub use model::*;
pub use errors::*;
