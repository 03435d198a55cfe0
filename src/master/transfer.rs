use std::fmt;

use super::address::{
	Address,
	Direction,
};

/// Whether `write`/`read` wait for the transaction to finish.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Mode {
	/// spin until the channel is idle again; the tick source must keep
	/// running meanwhile
	Blocking,
	/// return right after arming; poll `is_busy()` and collect the outcome
	/// with `take_outcome()`
	NonBlocking,
}

/// Which acknowledge slot saw SDA high.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Nack {
	Address,
	// index into the written data
	Data { index: usize },
}

impl fmt::Display for Nack {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self {
			Nack::Address => write!(f, "address not acknowledged"),
			Nack::Data { index } => write!(f, "data byte {} not acknowledged", index),
		}
	}
}

/// Result of a finished transaction.
///
/// A NACK ends the transaction early with a regular STOP; electrically (and
/// for `is_busy()`) that looks exactly like a successful transaction, `nack`
/// is the only place it shows up.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Outcome {
	pub address: Address,
	pub direction: Direction,
	/// the buffer handed to `write`/`read`; received bytes are stored in
	/// place, bytes past `transferred` are untouched
	pub buffer: Vec<u8>,
	/// data bytes acknowledged by the target (write) or received (read)
	pub transferred: usize,
	pub nack: Option<Nack>,
}

impl Outcome {
	pub fn is_complete(&self) -> bool {
		self.nack.is_none() && self.transferred == self.buffer.len()
	}

	/// Received (or acknowledged) part of the buffer.
	pub fn data(&self) -> &[u8] {
		&self.buffer[..self.transferred]
	}

	pub fn into_result(self) -> crate::AResult<Vec<u8>> {
		if let Some(nack) = self.nack {
			bail!("I2C {} to {}: {}", match self.direction {
				Direction::Write => "write",
				Direction::Read => "read",
			}, self.address, nack);
		}
		Ok(self.buffer)
	}
}

/// Parameters of an armed transaction, moved from the caller to the tick
/// context.
#[derive(Debug)]
pub(super) struct Transfer {
	pub address: Address,
	pub direction: Direction,
	pub address_byte: u8,
	pub buffer: Vec<u8>,
	pub write_count: usize,
	pub read_count: usize,
}

impl Transfer {
	pub fn write(address: Address, data: Vec<u8>) -> Self {
		Transfer {
			address,
			direction: Direction::Write,
			address_byte: address.address_byte(Direction::Write),
			write_count: data.len(),
			read_count: 0,
			buffer: data,
		}
	}

	pub fn read(address: Address, buffer: Vec<u8>) -> Self {
		Transfer {
			address,
			direction: Direction::Read,
			address_byte: address.address_byte(Direction::Read),
			write_count: 0,
			read_count: buffer.len(),
			buffer,
		}
	}
}
