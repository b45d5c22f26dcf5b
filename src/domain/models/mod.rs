mod assistant;
mod cart;
mod collaborators;
mod envelope;
mod error;
mod state;
mod widget;

pub use assistant::*;
pub use cart::*;
pub use collaborators::*;
pub use envelope::*;
pub use error::*;
pub use state::*;
pub use widget::*;
