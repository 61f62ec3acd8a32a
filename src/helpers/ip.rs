use std::fmt;
use std::net::Ipv4Addr;
use std::num::ParseIntError;
use std::str::FromStr;

use thiserror::Error;

/// An IPv4 host address as its big-endian 32-bit integer value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u32);

impl Address {
    pub const UNSPECIFIED: Address = Address(0);

    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub const fn is_unspecified(self) -> bool {
        self.0 == 0
    }
}

// The derived Hash writes the inner u32 exactly once
impl nohash_hasher::IsEnabled for Address {}

impl From<Address> for Ipv4Addr {
    fn from(addr: Address) -> Self {
        Ipv4Addr::from(addr.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&Ipv4Addr::from(*self), f)
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum AddressFormatError {
    #[error("expected 4 dot-separated components in `{input}`, found {found}")]
    ComponentCount { input: String, found: usize },

    #[error("invalid octet `{component}` in `{input}`")]
    Component {
        input: String,
        component: String,
        source: ParseIntError,
    },
}

impl FromStr for Address {
    type Err = AddressFormatError;

    /// Parses dotted-quad text. Octets may carry leading zeros, but each
    /// needs to fit into a single byte.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        use AddressFormatError as E;

        let components: Vec<&str> = input.split('.').collect();
        if components.len() != 4 {
            return Err(E::ComponentCount {
                input: input.to_string(),
                found: components.len(),
            });
        }

        let mut octets = [0u8; 4];
        for (octet, component) in octets.iter_mut().zip(components) {
            *octet = component.parse().map_err(|source| E::Component {
                input: input.to_string(),
                component: component.to_string(),
                source,
            })?;
        }
        Ok(Self(u32::from_be_bytes(octets)))
    }
}
