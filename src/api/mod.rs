pub mod modbus;

pub use modbus::{ModbusServer, ModbusServerBuilder};
