pub mod capture;
pub mod devices;
pub mod monitor;
pub mod session;
pub mod wav;
