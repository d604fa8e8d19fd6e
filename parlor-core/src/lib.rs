//! Domain primitives shared by the parlor server and its clients.

mod activity;
mod identity;
mod signal;
mod util;

pub use activity::*;
pub use identity::*;
pub use signal::*;
pub use util::*;
