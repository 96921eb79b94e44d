//! Device addressing
//!
//! A remote endpoint is identified by its network address plus the protocol
//! object identifier (class group, class code, instance). The [`DeviceKey`]
//! derived from the pair is what admission control is keyed on.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced when parsing device identifiers
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeviceParseError {
    #[error("Object id must be 6 hex digits, got '{0}'")]
    InvalidObjectId(String),

    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Device id must look like <ip>/<object-id>, got '{0}'")]
    InvalidFormat(String),
}

/// Protocol object identifier (class group, class code, instance)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId {
    pub class_group: u8,
    pub class_code: u8,
    pub instance: u8,
}

impl ObjectId {
    /// Node profile object, present on every node
    pub const NODE_PROFILE: ObjectId = ObjectId::new(0x0E, 0xF0, 0x01);

    pub const fn new(class_group: u8, class_code: u8, instance: u8) -> Self {
        Self {
            class_group,
            class_code,
            instance,
        }
    }

    /// Build from a 16-bit class code and an instance number
    pub const fn from_class(class: u16, instance: u8) -> Self {
        Self::new((class >> 8) as u8, (class & 0xFF) as u8, instance)
    }

    /// Combined 16-bit class code
    pub fn class(&self) -> u16 {
        (u16::from(self.class_group) << 8) | u16::from(self.class_code)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}{:02X}{:02X}", self.class_group, self.class_code, self.instance)
    }
}

impl FromStr for ObjectId {
    type Err = DeviceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 6 || !s.is_ascii() {
            return Err(DeviceParseError::InvalidObjectId(s.to_string()));
        }
        let byte = |i: usize| {
            u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| DeviceParseError::InvalidObjectId(s.to_string()))
        };
        Ok(Self::new(byte(0)?, byte(2)?, byte(4)?))
    }
}

/// A remote device: network address plus object identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceAddr {
    pub ip: IpAddr,
    pub object: ObjectId,
}

impl DeviceAddr {
    pub fn new(ip: IpAddr, object: ObjectId) -> Self {
        Self { ip, object }
    }

    /// Admission key for this device
    pub fn key(&self) -> DeviceKey {
        DeviceKey::from(self)
    }

    /// The node profile object living at the same address
    pub fn node_profile(&self) -> DeviceAddr {
        DeviceAddr::new(self.ip, ObjectId::NODE_PROFILE)
    }
}

impl fmt::Display for DeviceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ip, self.object)
    }
}

impl FromStr for DeviceAddr {
    type Err = DeviceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ip, object) = s
            .rsplit_once('/')
            .ok_or_else(|| DeviceParseError::InvalidFormat(s.to_string()))?;
        let ip = ip
            .parse::<IpAddr>()
            .map_err(|_| DeviceParseError::InvalidAddress(ip.to_string()))?;
        Ok(Self::new(ip, object.parse()?))
    }
}

/// Deterministic admission key: `<ip>:<CLASS>:<INSTANCE>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceKey(String);

impl DeviceKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&DeviceAddr> for DeviceKey {
    fn from(device: &DeviceAddr) -> Self {
        Self(format!("{}:{:04X}:{:02X}", device.ip, device.object.class(), device.object.instance))
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
