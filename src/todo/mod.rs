pub mod aggregate;
pub mod data;
pub mod endpoints;
pub mod helpers;
pub mod service;
pub mod util;
