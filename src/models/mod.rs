pub mod equipment;
pub mod invitation;
pub mod result;
pub mod trip;
pub mod trip_info;
pub mod user;
