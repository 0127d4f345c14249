pub mod handler;
pub mod modbus;
pub mod types;
