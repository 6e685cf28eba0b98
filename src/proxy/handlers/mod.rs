// Handlers module - API endpoint handlers

pub mod generic;
pub mod location;
pub mod weather;
