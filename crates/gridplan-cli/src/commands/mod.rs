pub mod bnb;
pub mod plan;
pub mod util;
pub mod validate;
