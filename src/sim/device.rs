use std::collections::VecDeque;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Slave {
	Idle,
	ReceiveAddress,
	// driving our ACK during the 9th clock
	Ack { transmit: bool },
	ReceiveData,
	// didn't ACK the last byte, wait for STOP
	Ignore,
	Transmit,
	// master drives ACK/NACK
	MasterAck,
}

/// Edge driven model of an I2C target device.
///
/// Receives written bytes into a log and answers reads from a queue of
/// response bytes (`0xff` once the queue is empty, like a released bus).
#[derive(Clone, Debug)]
pub struct SimDevice {
	address: u8,
	ack_limit: Option<usize>,
	responses: VecDeque<u8>,
	received: Vec<u8>,
	sent: Vec<u8>,
	master_acks: Vec<bool>,

	state: Slave,
	shift: u8,
	bits: u8,
	written_in_transaction: usize,
	drive_low: bool,
}

impl SimDevice {
	pub fn new(address: u8) -> Self {
		SimDevice {
			address,
			ack_limit: None,
			responses: VecDeque::new(),
			received: Vec::new(),
			sent: Vec::new(),
			master_acks: Vec::new(),
			state: Slave::Idle,
			shift: 0,
			bits: 0,
			written_in_transaction: 0,
			drive_low: false,
		}
	}

	/// Queue bytes to answer read transactions with.
	pub fn with_responses(mut self, bytes: &[u8]) -> Self {
		self.responses.extend(bytes);
		self
	}

	/// ACK only the first `limit` data bytes of each write transaction.
	pub fn with_ack_limit(mut self, limit: usize) -> Self {
		self.ack_limit = Some(limit);
		self
	}

	pub fn address(&self) -> u8 {
		self.address
	}

	/// Every data byte seen in write transactions (including a NACKed one).
	pub fn received(&self) -> &[u8] {
		&self.received
	}

	/// Bytes put on the bus in read transactions.
	pub fn sent(&self) -> &[u8] {
		&self.sent
	}

	/// ACK (`true`) or NACK from the master after each sent byte.
	pub fn master_acks(&self) -> &[bool] {
		&self.master_acks
	}

	pub fn drives_sda_low(&self) -> bool {
		self.drive_low
	}

	pub(super) fn start(&mut self) {
		self.state = Slave::ReceiveAddress;
		self.shift = 0;
		self.bits = 0;
		self.written_in_transaction = 0;
		self.drive_low = false;
	}

	pub(super) fn stop(&mut self) {
		self.state = Slave::Idle;
		self.drive_low = false;
	}

	pub(super) fn scl_rise(&mut self, sda: bool) {
		match self.state {
			Slave::ReceiveAddress | Slave::ReceiveData => {
				self.shift = (self.shift << 1) | (sda as u8);
				self.bits += 1;
			},
			Slave::Transmit => {
				self.bits += 1;
			},
			Slave::MasterAck => {
				self.master_acks.push(!sda);
			},
			Slave::Idle | Slave::Ack { .. } | Slave::Ignore => (),
		}
	}

	fn load_next(&mut self) {
		let byte = self.responses.pop_front().unwrap_or(0xff);
		self.sent.push(byte);
		self.shift = byte;
		self.bits = 0;
		self.drive_low = 0 == byte & 0x80;
		self.state = Slave::Transmit;
	}

	pub(super) fn scl_fall(&mut self) {
		match self.state {
			Slave::ReceiveAddress if self.bits == 8 => {
				if self.shift >> 1 == self.address {
					self.drive_low = true;
					self.state = Slave::Ack { transmit: 0 != self.shift & 0x01 };
				} else {
					self.state = Slave::Idle;
				}
			},
			Slave::ReceiveData if self.bits == 8 => {
				self.received.push(self.shift);
				self.written_in_transaction += 1;
				let ack = self.ack_limit.map_or(true, |limit| self.written_in_transaction <= limit);
				if ack {
					self.drive_low = true;
					self.state = Slave::Ack { transmit: false };
				} else {
					self.state = Slave::Ignore;
				}
			},
			Slave::Ack { transmit } => {
				self.drive_low = false;
				if transmit {
					self.load_next();
				} else {
					self.shift = 0;
					self.bits = 0;
					self.state = Slave::ReceiveData;
				}
			},
			Slave::Transmit => {
				if self.bits == 8 {
					self.drive_low = false;
					self.state = Slave::MasterAck;
				} else {
					self.shift <<= 1;
					self.drive_low = 0 == self.shift & 0x80;
				}
			},
			Slave::MasterAck => {
				if self.master_acks.last() == Some(&true) {
					self.load_next();
				} else {
					self.state = Slave::Idle;
				}
			},
			_ => (),
		}
	}
}
