mod author;
mod error;
mod event;
mod message;
mod session;

pub use author::*;
pub use error::*;
pub use event::*;
pub use message::*;
pub use session::*;
