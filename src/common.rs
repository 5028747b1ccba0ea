//! Miscellaneous common structs used throughout the library.

mod distance;
mod id;
pub mod messages;
mod node;
mod routing_table;

pub use distance::*;
pub use id::*;
pub use messages::Message;
pub use node::*;
pub use routing_table::*;
