pub mod ads;
pub mod assistant;
pub mod billing;
pub mod calendar;
pub mod core;
pub mod email;
pub mod feedback;
pub mod integrations;
pub mod landing;
pub mod main_module;
pub mod meet;
pub mod storage;
pub mod tenants;
pub mod waitlist;
