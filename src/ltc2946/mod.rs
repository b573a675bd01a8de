//! LTC2946 power/voltage/current monitor support: register map, wire
//! codec, unit conversion and the per-chip bus task.

pub mod bus;
pub mod codec;
pub mod convert;
pub mod monitor;
pub mod registers;
