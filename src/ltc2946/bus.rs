use crate::prelude::*;
use embedded_hal::i2c::I2c;
use linux_embedded_hal::I2cdev;

/// Block transfers against the chip's register file. The production
/// implementation sits on a Linux i2c-dev node; tests substitute an
/// in-memory register map.
pub trait BlockBus: Send {
    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<()>;
    fn write_block(&mut self, register: u8, data: &[u8]) -> Result<()>;
}

pub struct LinuxBus {
    dev: I2cdev,
    address: u8,
}

impl LinuxBus {
    pub fn open(path: &str, address: u8) -> Result<Self> {
        let dev =
            I2cdev::new(path).map_err(|err| anyhow!("bus.rs:error opening {}: {:?}", path, err))?;
        Ok(Self { dev, address })
    }
}

impl BlockBus for LinuxBus {
    fn read_block(&mut self, register: u8, buf: &mut [u8]) -> Result<()> {
        self.dev
            .write_read(self.address, &[register], buf)
            .map_err(|err| anyhow!("read of register {:#04x} failed: {:?}", register, err))
    }

    fn write_block(&mut self, register: u8, data: &[u8]) -> Result<()> {
        // register byte plus at most one 3-byte power value
        let mut frame = [0u8; 4];
        frame[0] = register;
        frame[1..=data.len()].copy_from_slice(data);
        self.dev
            .write(self.address, &frame[..=data.len()])
            .map_err(|err| anyhow!("write of register {:#04x} failed: {:?}", register, err))
    }
}
