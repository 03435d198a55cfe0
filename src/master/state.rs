/// Protocol state of a channel.
///
/// `Idle` is the only initial state, and every transaction (complete or
/// truncated by a NACK) ends in it again.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum State {
	Idle,
	Start,
	TransmitByte,
	ReadAck,
	ReceiveByte,
	SendAck,
	SendNack,
	Stop,
}

/// Position within the current bit cycle; one tick per quarter.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Phase {
	Q0,
	Q1,
	Q2,
	Q3,
}

impl Phase {
	pub fn next(self) -> Self {
		match self {
			Phase::Q0 => Phase::Q1,
			Phase::Q1 => Phase::Q2,
			Phase::Q2 => Phase::Q3,
			Phase::Q3 => Phase::Q0,
		}
	}

	pub fn index(self) -> u8 {
		self as u8
	}
}
