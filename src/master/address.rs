use std::fmt;
use std::str;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Direction {
	Write,
	Read,
}

impl Direction {
	fn bit(self) -> u8 {
		match self {
			Direction::Write => 0,
			Direction::Read => 1,
		}
	}
}

/// 7-bit I2C target address.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u8);

impl Address {
	pub const MAX: u8 = 0x7f;

	pub fn new(address: u8) -> crate::AResult<Self> {
		ensure!(address <= Self::MAX, "I2C address 0x{:02x} doesn't fit in 7 bits", address);
		Ok(Address(address))
	}

	pub fn get(&self) -> u8 {
		self.0
	}

	/// First byte on the wire: address in the upper 7 bits, direction in
	/// bit 0.
	pub fn address_byte(&self, direction: Direction) -> u8 {
		(self.0 << 1) | direction.bit()
	}
}

impl fmt::Debug for Address {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "Address(0x{:02x})", self.0)
	}
}

impl fmt::Display for Address {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "0x{:02x}", self.0)
	}
}

impl str::FromStr for Address {
	type Err = ::failure::Error;

	// always hex, "0x" prefix optional
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let digits = if s.starts_with("0x") || s.starts_with("0X") { &s[2..] } else { s };
		ensure!(!digits.is_empty() && digits.len() <= 2, "invalid I2C address: {:?}", s);

		let address = with_context!(("invalid I2C address: {:?}", s),
			u8::from_str_radix(digits, 16).map_err(|e| e.into())
		)?;
		Address::new(address)
	}
}
