/// Control register A. Written once at attach time to route the voltage
/// measurement to the external ADIN pin.
pub const CTRLA: u8 = 0x00;

/// CTRLA value: ADIN voltage selection, continuous scan of all channels.
pub const CTRLA_INIT: u8 = 0x18;

// 24-bit power registers, 31250 nW per count.
pub const POWER: u8 = 0x05;
pub const MAX_POWER: u8 = 0x08;
pub const MIN_POWER: u8 = 0x0B;

// 12-bit current-sense registers, 25000 nV per count across the shunt.
pub const DELTA_SENSE: u8 = 0x14;
pub const MAX_DELTA_SENSE: u8 = 0x16;
pub const MIN_DELTA_SENSE: u8 = 0x18;

// 12-bit ADIN voltage registers, 500 uV per count at the pin.
pub const ADIN: u8 = 0x28;
pub const MAX_ADIN: u8 = 0x2A;
pub const MIN_ADIN: u8 = 0x2C;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Power,
    Voltage,
    Current,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Max,
    Min,
}

/// Register width on the wire: 3-byte power registers or 2-byte
/// left-justified 12-bit registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    Wide,
    Narrow,
}

/// One exposed attribute: an hwmon-style name bound to a chip register.
#[derive(Debug, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub quantity: Quantity,
    pub role: Role,
    pub register: u8,
}

/// The nine attributes, in registration order. `*_input` entries are
/// read-only; max/min thresholds accept writes.
pub static ATTRIBUTES: [Attribute; 9] = [
    Attribute {
        name: "power1_input",
        quantity: Quantity::Power,
        role: Role::Input,
        register: POWER,
    },
    Attribute {
        name: "power1_max",
        quantity: Quantity::Power,
        role: Role::Max,
        register: MAX_POWER,
    },
    Attribute {
        name: "power1_min",
        quantity: Quantity::Power,
        role: Role::Min,
        register: MIN_POWER,
    },
    Attribute {
        name: "in1_input",
        quantity: Quantity::Voltage,
        role: Role::Input,
        register: ADIN,
    },
    Attribute {
        name: "in1_max",
        quantity: Quantity::Voltage,
        role: Role::Max,
        register: MAX_ADIN,
    },
    Attribute {
        name: "in1_min",
        quantity: Quantity::Voltage,
        role: Role::Min,
        register: MIN_ADIN,
    },
    Attribute {
        name: "curr1_input",
        quantity: Quantity::Current,
        role: Role::Input,
        register: DELTA_SENSE,
    },
    Attribute {
        name: "curr1_max",
        quantity: Quantity::Current,
        role: Role::Max,
        register: MAX_DELTA_SENSE,
    },
    Attribute {
        name: "curr1_min",
        quantity: Quantity::Current,
        role: Role::Min,
        register: MIN_DELTA_SENSE,
    },
];

impl Attribute {
    pub fn width(&self) -> Width {
        match self.quantity {
            Quantity::Power => Width::Wide,
            Quantity::Voltage | Quantity::Current => Width::Narrow,
        }
    }

    pub fn writable(&self) -> bool {
        self.role != Role::Input
    }

    pub fn by_name(name: &str) -> Option<&'static Attribute> {
        ATTRIBUTES.iter().find(|a| a.name == name)
    }

    pub fn for_register(register: u8) -> Option<&'static Attribute> {
        ATTRIBUTES.iter().find(|a| a.register == register)
    }

    pub fn inputs() -> impl Iterator<Item = &'static Attribute> {
        ATTRIBUTES.iter().filter(|a| a.role == Role::Input)
    }
}

pub fn width_of(register: u8) -> Option<Width> {
    Attribute::for_register(register).map(|a| a.width())
}
