pub mod draft;
pub mod invitations;
pub mod trips;
