pub mod core;
pub mod driver;
pub mod logging;
pub mod services;
