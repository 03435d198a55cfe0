use std::sync::Arc;
use std::sync::atomic::{
	AtomicBool,
	Ordering,
};
use std::thread;
use std::time::{
	Duration,
	Instant,
};

use crate::lines::Lines;
use crate::master::Channel;

// below this the scheduler can't be trusted; spin instead
const SPIN_THRESHOLD: Duration = Duration::from_micros(100);

// sleep until `deadline`; returns immediately if it already passed
pub fn sleep_until(deadline: Instant) {
	loop {
		let now = Instant::now();
		if now >= deadline {
			return;
		}
		let remaining = deadline - now;
		if remaining > SPIN_THRESHOLD {
			thread::sleep(remaining - SPIN_THRESHOLD);
		} else {
			std::hint::spin_loop();
		}
	}
}

// next tick one period after the last deadline, but at least half a period
// after `now`; a late tick pushes the whole schedule back
fn next_deadline(deadline: Instant, now: Instant, period: Duration) -> Instant {
	let next = deadline + period;
	let earliest = now + period / 2;
	if next < earliest {
		now + period
	} else {
		next
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct TickerConfig {
	/// target I2C bit rate in Hz; ticks run at 4x this rate
	pub bit_rate: u32,
	/// try to switch the tick thread to SCHED_FIFO
	pub realtime: bool,
}

impl Default for TickerConfig {
	fn default() -> Self {
		TickerConfig {
			bit_rate: 100_000,
			realtime: false,
		}
	}
}

impl TickerConfig {
	pub fn tick_period(&self) -> Duration {
		Duration::from_nanos(1_000_000_000 / (4 * u64::from(self.bit_rate)))
	}
}

fn set_realtime_priority() {
	let param = libc::sched_param {
		sched_priority: 50,
	};
	// pid 0: calling thread
	let res = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
	if 0 != res {
		warn!("couldn't switch tick thread to SCHED_FIFO: {}", std::io::Error::last_os_error());
	}
}

/// Periodic driver: calls `Channel::tick` from a dedicated thread.
///
/// The thread is stopped and joined on drop. Ticks missed while the host
/// was busy elsewhere are dropped, not caught up on: the bus only ever runs
/// slower than configured, and two ticks are never less than half a period
/// apart.
pub struct Ticker {
	stop: Arc<AtomicBool>,
	thread: Option<thread::JoinHandle<()>>,
}

impl Ticker {
	pub fn spawn<L>(channel: Arc<Channel<L>>, config: TickerConfig) -> crate::AResult<Ticker>
	where
		L: Lines + Send + 'static,
	{
		ensure!(config.bit_rate > 0, "bit rate must not be zero");
		let period = config.tick_period();
		let stop = Arc::new(AtomicBool::new(false));

		let thread = {
			let stop = stop.clone();
			with_context!(("spawn I2C tick thread"), {
				Ok(thread::Builder::new().name("bb-i2c-tick".into()).spawn(move || {
					if config.realtime {
						set_realtime_priority();
					}
					debug!("ticking every {:?}", period);
					let mut deadline = Instant::now();
					while !stop.load(Ordering::Relaxed) {
						channel.tick();
						deadline = next_deadline(deadline, Instant::now(), period);
						sleep_until(deadline);
					}
				})?)
			})?
		};

		Ok(Ticker {
			stop,
			thread: Some(thread),
		})
	}
}

impl Drop for Ticker {
	fn drop(&mut self) {
		self.stop.store(true, Ordering::Relaxed);
		if let Some(thread) = self.thread.take() {
			if thread.join().is_err() {
				error!("I2C tick thread panicked");
			}
		}
	}
}
