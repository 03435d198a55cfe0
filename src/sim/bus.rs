use std::sync::{
	Arc,
	Mutex,
	MutexGuard,
};

use crate::lines::Lines;

use super::device::SimDevice;

/// What happened on the wires, in order.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BusEvent {
	/// SDA fell while SCL was high
	Start,
	/// SDA rose while SCL was high
	Stop,
	/// SCL rose; SDA level at that moment
	Clock(bool),
	/// SDA changed while SCL was low
	Data(bool),
	SclLow,
}

/// In-memory I2C bus for exercising a `Channel` without hardware.
///
/// Wired-AND with pull-ups: a line is high unless someone drives it low.
/// Every edge is kept in an event trace unless tracing is switched off.
#[derive(Debug)]
pub struct SimBus {
	master_sda_low: bool,
	master_scl_low: bool,
	sda: bool,
	scl: bool,
	devices: Vec<SimDevice>,
	trace: bool,
	events: Vec<BusEvent>,
}

impl SimBus {
	pub fn new() -> Self {
		SimBus {
			master_sda_low: false,
			master_scl_low: false,
			sda: true,
			scl: true,
			devices: Vec::new(),
			trace: true,
			events: Vec::new(),
		}
	}

	/// Don't record bus events (for long running simulations).
	pub fn without_trace(mut self) -> Self {
		self.trace = false;
		self
	}

	fn record(&mut self, event: BusEvent) {
		if self.trace {
			self.events.push(event);
		}
	}

	pub fn attach(&mut self, device: SimDevice) {
		self.devices.push(device);
	}

	pub fn device(&self, address: u8) -> Option<&SimDevice> {
		self.devices.iter().find(|d| d.address() == address)
	}

	pub fn sda(&self) -> bool {
		self.sda
	}

	pub fn scl(&self) -> bool {
		self.scl
	}

	pub fn events(&self) -> &[BusEvent] {
		&self.events
	}

	pub fn take_events(&mut self) -> Vec<BusEvent> {
		std::mem::replace(&mut self.events, Vec::new())
	}

	fn resolve_sda(&self) -> bool {
		!(self.master_sda_low || self.devices.iter().any(SimDevice::drives_sda_low))
	}

	// propagate level changes until nobody reacts anymore; devices only
	// move SDA on a falling clock, so this settles in a few rounds
	fn settle(&mut self) {
		loop {
			let scl = !self.master_scl_low;
			if scl != self.scl {
				self.scl = scl;
				if scl {
					let sda = self.sda;
					self.record(BusEvent::Clock(sda));
					for device in &mut self.devices {
						device.scl_rise(sda);
					}
				} else {
					self.record(BusEvent::SclLow);
					for device in &mut self.devices {
						device.scl_fall();
					}
				}
				continue;
			}

			let sda = self.resolve_sda();
			if sda != self.sda {
				self.sda = sda;
				if !self.scl {
					self.record(BusEvent::Data(sda));
				} else if sda {
					self.record(BusEvent::Stop);
					for device in &mut self.devices {
						device.stop();
					}
				} else {
					self.record(BusEvent::Start);
					for device in &mut self.devices {
						device.start();
					}
				}
				continue;
			}

			return;
		}
	}

	/// Bits clocked on the bus (SDA at each rising SCL) between the first
	/// START and the following STOP.
	pub fn clocked_bits(&self) -> Vec<bool> {
		self.events.iter()
			.skip_while(|e| **e != BusEvent::Start)
			.take_while(|e| **e != BusEvent::Stop)
			.filter_map(|e| match e {
				BusEvent::Clock(bit) => Some(*bit),
				_ => None,
			})
			.collect()
	}
}

impl Default for SimBus {
	fn default() -> Self {
		SimBus::new()
	}
}

/// `Lines` handle to a shared `SimBus`.
#[derive(Clone, Debug)]
pub struct SimLines {
	bus: Arc<Mutex<SimBus>>,
}

impl SimLines {
	pub fn new(bus: SimBus) -> Self {
		SimLines {
			bus: Arc::new(Mutex::new(bus)),
		}
	}

	pub fn bus(&self) -> MutexGuard<SimBus> {
		self.bus.lock().unwrap_or_else(|e| e.into_inner())
	}

	fn update<F: FnOnce(&mut SimBus)>(&mut self, f: F) {
		let mut bus = self.bus();
		f(&mut bus);
		bus.settle();
	}
}

impl Lines for SimLines {
	fn drive_sda_low(&mut self) {
		self.update(|bus| bus.master_sda_low = true)
	}

	fn release_sda(&mut self) {
		self.update(|bus| bus.master_sda_low = false)
	}

	fn drive_scl_low(&mut self) {
		self.update(|bus| bus.master_scl_low = true)
	}

	fn release_scl(&mut self) {
		self.update(|bus| bus.master_scl_low = false)
	}

	fn sample_sda(&mut self) -> bool {
		self.bus().sda
	}
}
