mod address;
mod channel;
mod state;
mod transfer;

pub use self::address::{
	Address,
	Direction,
};

pub use self::channel::Channel;

pub use self::state::{
	Phase,
	State,
};

pub use self::transfer::{
	Mode,
	Nack,
	Outcome,
};
