extern crate bb_i2c_master;

use std::sync::Arc;

use bb_i2c_master::master::State;
use bb_i2c_master::sim::{
	BusEvent,
	SimBus,
	SimDevice,
	SimLines,
};
use bb_i2c_master::{
	Address,
	Channel,
	Mode,
	Nack,
	Ticker,
	TickerConfig,
};

fn setup(devices: Vec<SimDevice>) -> (Channel<SimLines>, SimLines) {
	let mut bus = SimBus::new();
	for device in devices {
		bus.attach(device);
	}
	let lines = SimLines::new(bus);
	(Channel::new(lines.clone()), lines)
}

fn address(raw: u8) -> Address {
	Address::new(raw).unwrap()
}

// tick until idle; returns the state each tick ran in
fn run(channel: &Channel<SimLines>) -> Vec<State> {
	let mut trace = Vec::new();
	loop {
		trace.push(channel.state());
		channel.tick();
		if !channel.is_busy() {
			return trace;
		}
		assert!(trace.len() < 10_000, "transaction doesn't finish");
	}
}

// consecutive states collapsed into (state, ticks)
fn runs(trace: &[State]) -> Vec<(State, usize)> {
	let mut result: Vec<(State, usize)> = Vec::new();
	for &state in trace {
		if let Some(last) = result.last_mut() {
			if last.0 == state {
				last.1 += 1;
				continue;
			}
		}
		result.push((state, 1));
	}
	result
}

fn bits_of(byte: u8) -> Vec<bool> {
	(0..8).rev().map(|bit| 0 != byte & (1 << bit)).collect()
}

#[test]
fn write_single_byte() {
	let (channel, lines) = setup(vec![SimDevice::new(0x50)]);

	assert!(channel.write(address(0x50), vec![0xaa], Mode::NonBlocking).unwrap().is_none());
	let trace = run(&channel);

	assert_eq!(runs(&trace), vec![
		(State::Idle, 1),
		(State::Start, 4),
		(State::TransmitByte, 32),
		(State::ReadAck, 4),
		(State::TransmitByte, 32),
		(State::ReadAck, 4),
		(State::Stop, 4),
	]);
	assert_eq!(channel.state(), State::Idle);

	let outcome = channel.take_outcome().unwrap();
	assert!(outcome.is_complete());
	assert_eq!(outcome.buffer, vec![0xaa]);
	assert_eq!(lines.bus().device(0x50).unwrap().received(), &[0xaa]);

	let bus = lines.bus();
	assert!(bus.sda() && bus.scl(), "bus must be idle after STOP");
}

#[test]
fn read_two_bytes() {
	let (channel, lines) = setup(vec![SimDevice::new(0x50).with_responses(&[0x12, 0x34])]);

	channel.read(address(0x50), vec![0; 2], Mode::NonBlocking).unwrap();
	let trace = run(&channel);

	assert_eq!(runs(&trace), vec![
		(State::Idle, 1),
		(State::Start, 4),
		(State::TransmitByte, 32),
		(State::ReadAck, 4),
		(State::ReceiveByte, 32),
		(State::SendAck, 4),
		(State::ReceiveByte, 32),
		(State::SendNack, 4),
		(State::Stop, 4),
	]);

	let outcome = channel.take_outcome().unwrap();
	assert_eq!(outcome.buffer, vec![0x12, 0x34]);
	assert_eq!(outcome.data(), &[0x12, 0x34]);
	assert_eq!(outcome.transferred, 2);
	assert_eq!(outcome.nack, None);
	assert_eq!(lines.bus().device(0x50).unwrap().master_acks(), &[true, false]);
}

#[test]
fn address_nack_leaves_buffer_untouched() {
	let (channel, lines) = setup(vec![SimDevice::new(0x51).with_responses(&[0x00])]);

	channel.read(address(0x50), vec![0xee; 2], Mode::NonBlocking).unwrap();
	let trace = run(&channel);

	assert_eq!(runs(&trace), vec![
		(State::Idle, 1),
		(State::Start, 4),
		(State::TransmitByte, 32),
		(State::ReadAck, 4),
		(State::Stop, 4),
	]);
	assert!(!channel.is_busy());

	let outcome = channel.take_outcome().unwrap();
	assert_eq!(outcome.nack, Some(Nack::Address));
	assert_eq!(outcome.buffer, vec![0xee, 0xee]);
	assert_eq!(outcome.transferred, 0);
	assert!(outcome.data().is_empty());
	assert!(outcome.into_result().is_err());
	assert!(lines.bus().device(0x51).unwrap().sent().is_empty());
}

#[test]
fn data_nack_stops_after_four_ticks() {
	let (channel, lines) = setup(vec![SimDevice::new(0x20).with_ack_limit(1)]);

	channel.write(address(0x20), vec![1, 2, 3, 4, 5], Mode::NonBlocking).unwrap();
	let trace = run(&channel);

	let runs = runs(&trace);
	assert_eq!(&runs[runs.len() - 2..], &[(State::ReadAck, 4), (State::Stop, 4)][..]);
	// address + two data bytes, the second one NACKed
	assert_eq!(runs.iter().filter(|r| r.0 == State::TransmitByte).count(), 3);

	let outcome = channel.take_outcome().unwrap();
	assert_eq!(outcome.nack, Some(Nack::Data { index: 1 }));
	assert_eq!(outcome.transferred, 1);
	assert_eq!(outcome.data(), &[1]);
	assert_eq!(outcome.buffer, vec![1, 2, 3, 4, 5]);
	assert_eq!(lines.bus().device(0x20).unwrap().received(), &[1, 2]);
}

#[test]
fn every_byte_value_goes_out_msb_first() {
	let (channel, lines) = setup(vec![SimDevice::new(0x3c)]);

	for value in 0..=255u8 {
		lines.bus().take_events();
		channel.write(address(0x3c), vec![value], Mode::NonBlocking).unwrap();
		let trace = run(&channel);
		assert_eq!(trace.iter().filter(|s| **s == State::TransmitByte).count(), 2 * 32);

		let bits = lines.bus().clocked_bits();
		let mut expected = bits_of(0x3c << 1);
		expected.push(false); // ACK
		expected.extend(bits_of(value));
		expected.push(false); // ACK
		assert_eq!(&bits[..18], &expected[..], "value 0x{:02x}", value);
	}

	let received: Vec<u8> = (0..=255u8).collect();
	assert_eq!(lines.bus().device(0x3c).unwrap().received(), &received[..]);
}

#[test]
fn start_and_stop_conditions() {
	let (channel, lines) = setup(vec![SimDevice::new(0x50)]);
	assert!(lines.bus().events().is_empty(), "init must not disturb an idle bus");

	channel.write(address(0x50), vec![0x00], Mode::NonBlocking).unwrap();
	run(&channel);

	let events = lines.bus().take_events();
	// SDA falls while SCL is high, SCL follows
	assert_eq!(&events[..2], &[BusEvent::Start, BusEvent::SclLow][..]);
	// SDA low, clock up, SDA rises while SCL is high
	assert_eq!(&events[events.len() - 3..], &[
		BusEvent::Data(false),
		BusEvent::Clock(false),
		BusEvent::Stop,
	][..]);
	assert_eq!(events.iter().filter(|e| **e == BusEvent::Start).count(), 1);
	assert_eq!(events.iter().filter(|e| **e == BusEvent::Stop).count(), 1);
}

#[test]
fn read_acks_all_but_the_last_byte() {
	for n in 1..=5usize {
		let responses: Vec<u8> = (0..n as u8).map(|i| 0xa5 ^ i).collect();
		let (channel, lines) = setup(vec![SimDevice::new(0x68).with_responses(&responses)]);

		channel.read(address(0x68), vec![0; n], Mode::NonBlocking).unwrap();
		let trace = run(&channel);
		let runs = runs(&trace);

		assert_eq!(runs.iter().filter(|r| r.0 == State::SendAck).count(), n - 1);
		assert_eq!(runs.iter().filter(|r| r.0 == State::SendNack).count(), 1);
		assert_eq!(runs.iter().filter(|r| r.0 == State::ReceiveByte).count(), n);

		let mut acks = vec![true; n - 1];
		acks.push(false);
		assert_eq!(lines.bus().device(0x68).unwrap().master_acks(), &acks[..]);
		assert_eq!(channel.take_outcome().unwrap().buffer, responses);
	}
}

#[test]
fn zero_length_write_probes_address() {
	let (channel, _lines) = setup(vec![SimDevice::new(0x42)]);

	channel.write(address(0x42), Vec::new(), Mode::NonBlocking).unwrap();
	run(&channel);
	assert_eq!(channel.take_outcome().unwrap().nack, None);

	channel.write(address(0x43), Vec::new(), Mode::NonBlocking).unwrap();
	run(&channel);
	assert_eq!(channel.take_outcome().unwrap().nack, Some(Nack::Address));
}

#[test]
fn back_to_back_transactions() {
	let (channel, lines) = setup(vec![SimDevice::new(0x50).with_responses(&[0x99])]);

	channel.write(address(0x50), vec![0x10, 0x20], Mode::NonBlocking).unwrap();
	run(&channel);
	assert!(channel.take_outcome().unwrap().is_complete());

	// idle ticks in between change nothing
	for _ in 0..7 {
		channel.tick();
	}
	assert!(!channel.is_busy());

	channel.read(address(0x50), vec![0], Mode::NonBlocking).unwrap();
	run(&channel);
	assert_eq!(channel.take_outcome().unwrap().buffer, vec![0x99]);
	assert_eq!(lines.bus().device(0x50).unwrap().received(), &[0x10, 0x20]);
}

#[test]
fn blocking_calls_with_ticker() {
	let mut bus = SimBus::new();
	bus.attach(SimDevice::new(0x50).with_responses(&[0x12, 0x34]));
	let lines = SimLines::new(bus);
	let channel = Arc::new(Channel::new(lines.clone()));

	let _ticker = Ticker::spawn(channel.clone(), TickerConfig {
		bit_rate: 1_000_000,
		realtime: false,
	}).unwrap();

	let outcome = channel.write(address(0x50), vec![0xaa], Mode::Blocking).unwrap().unwrap();
	assert!(outcome.is_complete());
	assert!(!channel.is_busy());

	let outcome = channel.read(address(0x50), vec![0; 2], Mode::Blocking).unwrap().unwrap();
	assert_eq!(outcome.buffer, vec![0x12, 0x34]);

	let outcome = channel.write(address(0x11), vec![0xaa], Mode::Blocking).unwrap().unwrap();
	assert_eq!(outcome.nack, Some(Nack::Address));

	assert_eq!(lines.bus().device(0x50).unwrap().received(), &[0xaa]);
}
