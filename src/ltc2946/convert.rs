//! Conversion between raw register counts and physical units.
//!
//! Power registers count 31250 nW per bit, the ADIN voltage registers
//! 500 uV per bit at the pin, and the current-sense registers 25000 nV
//! per bit across the shunt. All arithmetic is staged truncating i64
//! division, so a set followed by a read lands within one unit of the
//! requested value rather than reproducing it exactly.

use crate::ltc2946::codec;
use crate::ltc2946::registers::{Attribute, Quantity};

pub const POWER_NW_PER_COUNT: i64 = 31250;
pub const VOLTAGE_UV_PER_COUNT: i64 = 500;
pub const CURRENT_NV_PER_COUNT: i64 = 25000;

/// Electrical parameters of the monitored rail, fixed at attach time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineParams {
    /// Shunt resistance in micro-ohm.
    pub shunt_uohm: u32,
    /// ADIN divider resistors; correction factor is (r1 + r2) / r2.
    pub adin_r1: u32,
    pub adin_r2: u32,
}

impl Default for LineParams {
    fn default() -> Self {
        Self {
            shunt_uohm: 1000,
            adin_r1: 1,
            adin_r2: 1000,
        }
    }
}

pub fn power_mw_from_raw(raw: u32) -> i64 {
    raw as i64 * POWER_NW_PER_COUNT / 1000
}

pub fn power_raw_from_mw(mw: i64) -> u32 {
    (mw * 1000 / POWER_NW_PER_COUNT).clamp(0, codec::WIDE_MAX as i64) as u32
}

pub fn voltage_mv_from_raw(raw: u16, params: &LineParams) -> i64 {
    let pin_mv = raw as i64 * VOLTAGE_UV_PER_COUNT / 1000;
    pin_mv * (params.adin_r1 + params.adin_r2) as i64 / params.adin_r2 as i64
}

pub fn voltage_raw_from_mv(mv: i64, params: &LineParams) -> u16 {
    let pin_mv = mv * params.adin_r2 as i64 / (params.adin_r1 + params.adin_r2) as i64;
    (pin_mv * 1000 / VOLTAGE_UV_PER_COUNT).clamp(0, codec::NARROW_MAX as i64) as u16
}

pub fn current_ma_from_raw(raw: u16, params: &LineParams) -> i64 {
    raw as i64 * CURRENT_NV_PER_COUNT / params.shunt_uohm as i64
}

pub fn current_raw_from_ma(ma: i64, params: &LineParams) -> u16 {
    (ma * params.shunt_uohm as i64 / CURRENT_NV_PER_COUNT).clamp(0, codec::NARROW_MAX as i64)
        as u16
}

/// Raw register counts -> the attribute's display unit (mW, mV or mA).
pub fn display_value(attribute: &Attribute, raw: u32, params: &LineParams) -> i64 {
    match attribute.quantity {
        Quantity::Power => power_mw_from_raw(raw),
        Quantity::Voltage => voltage_mv_from_raw(raw as u16, params),
        Quantity::Current => current_ma_from_raw(raw as u16, params),
    }
}

/// Display unit -> raw register counts, saturating at the register's
/// representable range.
pub fn raw_value(attribute: &Attribute, value: i64, params: &LineParams) -> u32 {
    match attribute.quantity {
        Quantity::Power => power_raw_from_mw(value),
        Quantity::Voltage => voltage_raw_from_mv(value, params) as u32,
        Quantity::Current => current_raw_from_ma(value, params) as u32,
    }
}
