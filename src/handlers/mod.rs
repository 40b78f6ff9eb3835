mod errors;
mod index;

pub use errors::not_found;
pub use index::index;
