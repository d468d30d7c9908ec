pub mod config;
pub mod csi;
pub mod driver;
pub mod exec;
pub mod lvm;
pub mod target;
