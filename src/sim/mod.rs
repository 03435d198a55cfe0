mod bus;
mod device;

pub use self::bus::{
	BusEvent,
	SimBus,
	SimLines,
};

pub use self::device::SimDevice;
