#[macro_use]
extern crate clap;
#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

extern crate bb_i2c_master;
use bb_i2c_master::*;

use std::process::exit;
use std::sync::Arc;

use bb_i2c_master::lines::SysfsLines;
use bb_i2c_master::sim::{
	SimBus,
	SimDevice,
	SimLines,
};

// addresses outside this range are reserved
const SCAN_FIRST: u8 = 0x08;
const SCAN_LAST: u8 = 0x77;

fn get_param<T>(matches: &clap::ArgMatches, name: &str) -> AResult<T>
where
	T: std::str::FromStr,
	failure::Error: From<<T as std::str::FromStr>::Err>,
{
	let param = match matches.value_of(name) {
		Some(p) => p,
		None => bail!("missing parameter {}", name),
	};
	param.parse::<T>().map_err(|e| {
		let e = failure::Error::from(e);
		let msg = format!("invalid parameter {}: {}", name, e);
		e.context(msg).into()
	})
}

fn parse_byte(s: &str) -> AResult<u8> {
	let digits = if s.starts_with("0x") || s.starts_with("0X") { &s[2..] } else { s };
	u8::from_str_radix(digits, 16).map_err(|e| format_err!("invalid byte {:?}: {}", s, e))
}

fn parse_bytes<'a, I: IntoIterator<Item = &'a str>>(values: I) -> AResult<Vec<u8>> {
	values.into_iter()
		.flat_map(|v| v.split(','))
		.filter(|v| !v.is_empty())
		.map(parse_byte)
		.collect()
}

fn hex(bytes: &[u8]) -> String {
	bytes.iter().map(|b| format!("{:02x}", b)).collect::<Vec<_>>().join(" ")
}

fn blocking(outcome: Option<Outcome>) -> AResult<Outcome> {
	outcome.ok_or_else(|| format_err!("blocking transaction returned without outcome"))
}

fn write<L: Lines>(channel: &Channel<L>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: Address = get_param(sub_m, "ADDRESS")?;
	let data = parse_bytes(sub_m.values_of("BYTES").into_iter().flatten())?;
	let len = data.len();

	blocking(channel.write(address, data, Mode::Blocking)?)?.into_result()?;
	info!("wrote {} bytes to {}", len, address);

	Ok(())
}

fn read<L: Lines>(channel: &Channel<L>, sub_m: &clap::ArgMatches) -> AResult<()> {
	let address: Address = get_param(sub_m, "ADDRESS")?;
	let count: usize = get_param(sub_m, "COUNT")?;

	let outcome = blocking(channel.read(address, vec![0u8; count], Mode::Blocking)?)?;
	if let Some(nack) = outcome.nack {
		bail!("I2C read from {}: {}", address, nack);
	}
	for (offset, chunk) in outcome.data().chunks(16).enumerate() {
		println!("{:04x}  {}", offset * 16, hex(chunk));
	}

	Ok(())
}

fn scan<L: Lines>(channel: &Channel<L>) -> AResult<()> {
	let mut found = 0;
	for raw in SCAN_FIRST..=SCAN_LAST {
		let address = Address::new(raw)?;
		let outcome = blocking(channel.write(address, Vec::new(), Mode::Blocking)?)?;
		if outcome.nack.is_none() {
			println!("{}", address);
			found += 1;
		}
	}
	info!("{} device(s) found", found);

	Ok(())
}

fn run<L>(lines: L, matches: &clap::ArgMatches) -> AResult<()>
where
	L: Lines + Send + 'static,
{
	let bit_rate: u32 = match matches.value_of("frequency") {
		None => TickerConfig::default().bit_rate,
		Some(_) => get_param(matches, "frequency")?,
	};
	let config = TickerConfig {
		bit_rate,
		realtime: matches.is_present("realtime"),
	};

	let channel = Arc::new(Channel::new(lines));
	let _ticker = Ticker::spawn(channel.clone(), config)?;

	match matches.subcommand() {
		("write", Some(sub_m)) => write(&channel, sub_m),
		("read", Some(sub_m)) => read(&channel, sub_m),
		("scan", _) => scan(&channel),
		("", _) => bail!("no subcommand"),
		(cmd, _) => bail!("not implemented subcommand {:?}", cmd),
	}
}

fn main_app() -> AResult<()> {
	let matches = clap_app!(@app (app_from_crate!())
		(@setting SubcommandRequiredElseHelp)
		(global_setting: clap::AppSettings::VersionlessSubcommands)
		(@arg sda: --sda +takes_value "GPIO number (sysfs) of the SDA line")
		(@arg scl: --scl +takes_value "GPIO number (sysfs) of the SCL line")
		(@arg frequency: -f --frequency +takes_value "I2C bit rate in Hz (default 100000)")
		(@arg realtime: --realtime "run the tick thread with SCHED_FIFO priority")
		(@arg simulate: --simulate +takes_value "use a simulated device at this address instead of GPIOs")
		(@arg response: --response +takes_value "bytes the simulated device answers reads with (hex, comma separated)")
		(@subcommand write =>
			(about: "write bytes to a device")
			(@arg ADDRESS: +required "7-bit device address (hex)")
			(@arg BYTES: +required +multiple "data bytes (hex)")
		)
		(@subcommand read =>
			(about: "read bytes from a device")
			(@arg ADDRESS: +required "7-bit device address (hex)")
			(@arg COUNT: +required "number of bytes to read")
		)
		(@subcommand scan =>
			(about: "list addresses acknowledging a zero-length write")
		)
	).get_matches();

	if matches.is_present("simulate") {
		let address: Address = get_param(&matches, "simulate")?;
		let responses = parse_bytes(matches.value_of("response"))?;

		let mut bus = SimBus::new().without_trace();
		bus.attach(SimDevice::new(address.get()).with_responses(&responses));
		let lines = SimLines::new(bus);

		run(lines.clone(), &matches)?;

		if let Some(device) = lines.bus().device(address.get()) {
			info!("simulated device {} received: [{}]", address, hex(device.received()));
		}
		Ok(())
	} else {
		let sda: u32 = get_param(&matches, "sda")?;
		let scl: u32 = get_param(&matches, "scl")?;
		let lines = SysfsLines::open(sda, scl)?;
		run(lines, &matches)
	}
}

fn main() {
	env_logger::from_env(env_logger::Env::default().default_filter_or("info")).init();

	if let Err(e) = main_app() {
		error!("Error: {}", e);
		exit(1);
	}
}
