pub mod reasoning;
pub mod session;
