use serde::{Deserialize, Serialize};

/// Number of raw measurement fields per record
pub const FIELD_COUNT: usize = 12;

/// Column names in the order the telemetry API returns them.
/// `Field::index` maps into this table.
pub const COLUMNS: [&str; FIELD_COUNT] = [
    "pm1.0_cf_1_a",
    "pm1.0_cf_1_b",
    "pm2.5_cf_1_a",
    "pm2.5_cf_1_b",
    "pm10.0_cf_1_a",
    "pm10.0_cf_1_b",
    "pm1.0_atm_a",
    "pm1.0_atm_b",
    "pm2.5_atm_a",
    "pm2.5_atm_b",
    "pm10.0_atm_a",
    "pm10.0_atm_b",
];

/// Name of the fused output column
pub const PM25_COLUMN: &str = "pm2.5";

/// Particle-size bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticleSize {
    Pm1_0,
    Pm2_5,
    Pm10_0,
}

impl ParticleSize {
    pub const ALL: [ParticleSize; 3] = [ParticleSize::Pm1_0, ParticleSize::Pm2_5, ParticleSize::Pm10_0];

    pub fn label(&self) -> &'static str {
        match self {
            ParticleSize::Pm1_0 => "pm1.0",
            ParticleSize::Pm2_5 => "pm2.5",
            ParticleSize::Pm10_0 => "pm10.0",
        }
    }

    fn ordinal(&self) -> usize {
        match self {
            ParticleSize::Pm1_0 => 0,
            ParticleSize::Pm2_5 => 1,
            ParticleSize::Pm10_0 => 2,
        }
    }
}

/// One of the sensor's two optical measurement paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    pub fn suffix(&self) -> &'static str {
        match self {
            Channel::A => "a",
            Channel::B => "b",
        }
    }
}

/// Correction-factor (cf=1) or atmospheric reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reading {
    Cf,
    Atm,
}

/// A single measurement column: size bucket x channel x reading kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub size: ParticleSize,
    pub channel: Channel,
    pub reading: Reading,
}

impl Field {
    /// All twelve fields, matching `COLUMNS` order
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::cf(ParticleSize::Pm1_0, Channel::A),
        Field::cf(ParticleSize::Pm1_0, Channel::B),
        Field::cf(ParticleSize::Pm2_5, Channel::A),
        Field::cf(ParticleSize::Pm2_5, Channel::B),
        Field::cf(ParticleSize::Pm10_0, Channel::A),
        Field::cf(ParticleSize::Pm10_0, Channel::B),
        Field::atm(ParticleSize::Pm1_0, Channel::A),
        Field::atm(ParticleSize::Pm1_0, Channel::B),
        Field::atm(ParticleSize::Pm2_5, Channel::A),
        Field::atm(ParticleSize::Pm2_5, Channel::B),
        Field::atm(ParticleSize::Pm10_0, Channel::A),
        Field::atm(ParticleSize::Pm10_0, Channel::B),
    ];

    pub const fn cf(size: ParticleSize, channel: Channel) -> Self {
        Self { size, channel, reading: Reading::Cf }
    }

    pub const fn atm(size: ParticleSize, channel: Channel) -> Self {
        Self { size, channel, reading: Reading::Atm }
    }

    /// Position of this field in a record's value array
    pub fn index(&self) -> usize {
        let reading = match self.reading {
            Reading::Cf => 0,
            Reading::Atm => 1,
        };
        let channel = match self.channel {
            Channel::A => 0,
            Channel::B => 1,
        };
        reading * 6 + self.size.ordinal() * 2 + channel
    }

    /// Column name as used by the telemetry API, e.g. `pm2.5_cf_1_a`
    pub fn column(&self) -> &'static str {
        COLUMNS[self.index()]
    }

    pub fn from_column(name: &str) -> Option<Self> {
        let name = name.trim();
        Field::ALL.iter().copied().find(|f| f.column() == name)
    }
}
