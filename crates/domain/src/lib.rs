pub mod calendar;
pub mod conflict;
pub mod external_event;
pub mod schedule;
pub mod sync_state;

pub use calendar::*;
pub use conflict::*;
pub use external_event::*;
pub use schedule::*;
pub use sync_state::*;
