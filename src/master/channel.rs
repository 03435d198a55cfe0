use std::sync::atomic::{
	AtomicBool,
	Ordering,
};
use std::sync::{
	Mutex,
	MutexGuard,
};

use crate::lines::Lines;

use super::address::{
	Address,
	Direction,
};
use super::state::{
	Phase,
	State,
};
use super::transfer::{
	Mode,
	Nack,
	Outcome,
	Transfer,
};

// a panic in another context must not wedge the bus for everyone else
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<T> {
	mutex.lock().unwrap_or_else(|e| e.into_inner())
}

/// State shared between the caller context and the tick context.
///
/// The caller owns `pending` until it sets `start_requested`; the tick
/// context owns `outcome` until it clears `busy`.
struct Handoff {
	start_requested: AtomicBool,
	busy: AtomicBool,
	pending: Mutex<Option<Transfer>>,
	outcome: Mutex<Option<Outcome>>,
}

/// Everything only the tick context touches.
struct Engine<L> {
	lines: L,
	state: State,
	phase: Phase,

	current: Option<(Address, Direction)>,
	address_byte: u8,
	buffer: Vec<u8>,
	write_count: usize,
	read_count: usize,

	byte_index: usize,
	bit_index: u8,
	shift_register: u8,
	nack: Option<Nack>,
}

impl<L: Lines> Engine<L> {
	fn load(&mut self, transfer: Transfer) {
		debug!("starting I2C transaction: {:?} {} ({} bytes)",
			transfer.direction, transfer.address, transfer.buffer.len());
		self.current = Some((transfer.address, transfer.direction));
		self.address_byte = transfer.address_byte;
		self.buffer = transfer.buffer;
		self.write_count = transfer.write_count;
		self.read_count = transfer.read_count;
		self.byte_index = 0;
		self.bit_index = 0;
		self.nack = None;
	}

	fn finish(&mut self, handoff: &Handoff) {
		let transferred = match self.nack {
			Some(Nack::Address) => 0,
			Some(Nack::Data { index }) => index,
			None => self.byte_index,
		};
		if let Some((address, direction)) = self.current.take() {
			*lock(&handoff.outcome) = Some(Outcome {
				address,
				direction,
				buffer: std::mem::replace(&mut self.buffer, Vec::new()),
				transferred,
				nack: self.nack,
			});
		}
		handoff.busy.store(false, Ordering::Release);
	}

	fn read_ack(&mut self) {
		if self.lines.sample_sda() {
			let nack = if self.byte_index == 0 {
				Nack::Address
			} else {
				Nack::Data { index: self.byte_index - 1 }
			};
			debug!("I2C transaction truncated: {}", nack);
			self.nack = Some(nack);
			self.state = State::Stop;
		} else if self.byte_index < self.write_count {
			self.shift_register = self.buffer[self.byte_index];
			self.byte_index += 1;
			self.bit_index = 8;
			self.state = State::TransmitByte;
		} else if self.byte_index < self.read_count {
			self.shift_register = 0;
			self.bit_index = 8;
			self.state = State::ReceiveByte;
		} else {
			self.state = State::Stop;
		}
		self.lines.drive_scl_low();
	}

	fn receive_bit(&mut self) {
		let bit = self.lines.sample_sda();
		self.shift_register = (self.shift_register << 1) | (bit as u8);
		self.lines.drive_scl_low();
		self.bit_index -= 1;
		if self.bit_index == 0 {
			self.buffer[self.byte_index] = self.shift_register;
			self.byte_index += 1;
			self.state = if self.byte_index < self.read_count {
				State::SendAck
			} else {
				State::SendNack
			};
		}
	}

	fn step(&mut self, handoff: &Handoff) {
		let previous = self.state;

		match (self.state, self.phase) {
			(State::Idle, _) => {
				if handoff.start_requested.swap(false, Ordering::Acquire) {
					match lock(&handoff.pending).take() {
						Some(transfer) => {
							self.load(transfer);
							// advanced to Q0 below, so START begins with the next tick
							self.phase = Phase::Q3;
							self.state = State::Start;
						},
						None => {
							warn!("I2C start requested without transaction parameters");
							handoff.busy.store(false, Ordering::Release);
						},
					}
				}
			},

			// bus is idle (both lines high) already
			(State::Start, Phase::Q0) | (State::Start, Phase::Q1) => (),
			(State::Start, Phase::Q2) => {
				// SDA falls while SCL is high
				self.lines.drive_sda_low();
			},
			(State::Start, Phase::Q3) => {
				self.lines.drive_scl_low();
				self.bit_index = 8;
				self.shift_register = self.address_byte;
				self.state = State::TransmitByte;
			},

			(State::TransmitByte, Phase::Q0) => {
				self.lines.set_sda(0 != self.shift_register & 0x80);
				self.shift_register <<= 1;
				self.bit_index -= 1;
			},
			(State::TransmitByte, Phase::Q1) => self.lines.release_scl(),
			(State::TransmitByte, Phase::Q3) => {
				self.lines.drive_scl_low();
				if self.bit_index == 0 {
					self.state = State::ReadAck;
				}
			},

			(State::ReadAck, Phase::Q0) => self.lines.release_sda(),
			(State::ReadAck, Phase::Q1) => self.lines.release_scl(),
			(State::ReadAck, Phase::Q3) => self.read_ack(),

			(State::ReceiveByte, Phase::Q0) => self.lines.release_sda(),
			(State::ReceiveByte, Phase::Q1) => self.lines.release_scl(),
			(State::ReceiveByte, Phase::Q3) => self.receive_bit(),

			(State::SendAck, Phase::Q0) => self.lines.drive_sda_low(),
			(State::SendAck, Phase::Q1) => self.lines.release_scl(),
			(State::SendAck, Phase::Q3) => {
				self.lines.drive_scl_low();
				self.bit_index = 8;
				self.state = State::ReceiveByte;
			},

			(State::SendNack, Phase::Q0) => self.lines.release_sda(),
			(State::SendNack, Phase::Q1) => self.lines.release_scl(),
			(State::SendNack, Phase::Q3) => {
				self.lines.drive_scl_low();
				self.state = State::Stop;
			},

			(State::Stop, Phase::Q0) => self.lines.drive_sda_low(),
			(State::Stop, Phase::Q1) => self.lines.release_scl(),
			(State::Stop, Phase::Q2) => {
				// SDA rises while SCL is high
				self.lines.release_sda();
			},
			(State::Stop, Phase::Q3) => {
				self.finish(handoff);
				self.state = State::Idle;
			},

			// slave samples / drives while SCL is high
			(_, Phase::Q2) => (),
		}

		if previous != self.state {
			trace!("I2C {:?} -> {:?}", previous, self.state);
		}
		self.phase = self.phase.next();
	}
}

/// One software I2C master bus.
///
/// `tick()` has to be called at four times the bit rate (for 100 kHz every
/// 2.5 µs); `write`/`read` arm a transaction which the ticks then play out
/// on the lines. Ticks must not overlap each other, and a blocking call only
/// returns while something keeps ticking.
///
/// At most one transaction is in flight; arming another one while busy is
/// refused.
pub struct Channel<L> {
	handoff: Handoff,
	engine: Mutex<Engine<L>>,
}

impl<L: Lines> Channel<L> {
	/// Takes the lines and releases both of them (idle bus).
	///
	/// Should happen before the periodic ticking starts.
	pub fn new(mut lines: L) -> Self {
		lines.release_scl();
		lines.release_sda();

		Channel {
			handoff: Handoff {
				start_requested: AtomicBool::new(false),
				busy: AtomicBool::new(false),
				pending: Mutex::new(None),
				outcome: Mutex::new(None),
			},
			engine: Mutex::new(Engine {
				lines,
				state: State::Idle,
				phase: Phase::Q0,
				current: None,
				address_byte: 0,
				buffer: Vec::new(),
				write_count: 0,
				read_count: 0,
				byte_index: 0,
				bit_index: 0,
				shift_register: 0,
				nack: None,
			}),
		}
	}

	/// Advance by one quarter bit period.
	pub fn tick(&self) {
		lock(&self.engine).step(&self.handoff);
	}

	pub fn is_busy(&self) -> bool {
		self.handoff.busy.load(Ordering::Acquire)
	}

	pub fn state(&self) -> State {
		lock(&self.engine).state
	}

	pub fn phase(&self) -> Phase {
		lock(&self.engine).phase
	}

	fn arm(&self, transfer: Transfer, mode: Mode) -> crate::AResult<Option<Outcome>> {
		let busy = &self.handoff.busy;
		if busy.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_err() {
			bail!("I2C channel busy, can't start {:?} transaction to {}", transfer.direction, transfer.address);
		}

		// uncollected result of the previous transaction
		lock(&self.handoff.outcome).take();
		*lock(&self.handoff.pending) = Some(transfer);
		self.handoff.start_requested.store(true, Ordering::Release);

		Ok(match mode {
			Mode::Blocking => self.wait(),
			Mode::NonBlocking => None,
		})
	}

	/// Send `data` to `address`.
	///
	/// In blocking mode returns the outcome (with `data` handed back in
	/// `buffer`); in non-blocking mode returns `None` right away.
	pub fn write(&self, address: Address, data: Vec<u8>, mode: Mode) -> crate::AResult<Option<Outcome>> {
		self.arm(Transfer::write(address, data), mode)
	}

	/// Receive `buffer.len()` bytes from `address` into `buffer`.
	pub fn read(&self, address: Address, buffer: Vec<u8>, mode: Mode) -> crate::AResult<Option<Outcome>> {
		self.arm(Transfer::read(address, buffer), mode)
	}

	/// Outcome of the last finished transaction, if not collected yet.
	pub fn take_outcome(&self) -> Option<Outcome> {
		if self.is_busy() {
			return None;
		}
		lock(&self.handoff.outcome).take()
	}

	/// Spin until the channel is idle, then collect the outcome.
	pub fn wait(&self) -> Option<Outcome> {
		while self.is_busy() {
			std::hint::spin_loop();
		}
		self.take_outcome()
	}
}
