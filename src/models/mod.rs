pub mod user;
pub mod event;
pub mod booking;

pub use user::{Role, User, UserSummary};
pub use event::{Event, EventCategory, EventFilter, EventView, LocationType};
pub use booking::{Booking, BookingScope, BookingStatus};
