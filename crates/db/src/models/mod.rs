pub mod calendar;
pub mod conflict;
pub mod credentials;
pub mod outbox;
pub mod schedule;
pub mod sync_state;

pub use calendar::*;
pub use conflict::*;
pub use credentials::*;
pub use outbox::*;
pub use schedule::*;
pub use sync_state::*;
