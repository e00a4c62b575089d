mod agent;
mod claim;
mod flag;
mod health;
mod message;
mod plan;
mod raid;
mod session;
mod task;

pub use agent::*;
pub use claim::*;
pub use flag::*;
pub use health::*;
pub use message::*;
pub use plan::*;
pub use raid::*;
pub use session::*;
pub use task::*;
