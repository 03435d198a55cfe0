use std::fs;
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{
	Path,
	PathBuf,
};
use std::thread;
use std::time::Duration;

use super::Lines;

const GPIO_ROOT: &str = "/sys/class/gpio";

// pins go through "direction" only: "in" releases, "low" drives the line low
// (output with initial value 0, set in a single write)
const DIRECTION_IN: &[u8] = b"in";
const DIRECTION_LOW: &[u8] = b"low";

/// A single GPIO exported through the legacy sysfs interface, used as an
/// open-drain line.
///
/// Dropping the pin releases the line, and unexports it again if `open`
/// exported it.
#[derive(Debug)]
pub struct SysfsPin {
	root: PathBuf,
	number: u32,
	exported: bool,
	direction: fs::File,
	value: fs::File,
}

impl SysfsPin {
	pub fn open(number: u32) -> crate::AResult<Self> {
		Self::open_in(Path::new(GPIO_ROOT), number)
	}

	// `root` is the sysfs gpio class directory (containing export/unexport)
	pub(super) fn open_in(root: &Path, number: u32) -> crate::AResult<Self> {
		let dir = root.join(format!("gpio{}", number));

		let exported = !dir.exists();
		if exported {
			with_context!(("export GPIO {}", number), {
				fs::OpenOptions::new().write(true).open(root.join("export"))?
					.write_all(number.to_string().as_bytes())?;
				Ok(())
			})?;
			// udev needs a moment to fix permissions on freshly exported pins
			for _ in 0..50 {
				if dir.join("direction").exists() { break; }
				thread::sleep(Duration::from_millis(10));
			}
		}

		let (direction, value) = with_context!(("open GPIO {}", number), {
			let direction = fs::OpenOptions::new().read(true).write(true).open(dir.join("direction"))?;
			let value = fs::OpenOptions::new().read(true).open(dir.join("value"))?;
			Ok((direction, value))
		})?;

		let mut pin = SysfsPin {
			root: root.to_path_buf(),
			number,
			exported,
			direction,
			value,
		};
		pin.release();
		Ok(pin)
	}

	pub fn number(&self) -> u32 {
		self.number
	}

	fn set_direction(&mut self, direction: &[u8]) {
		if let Err(e) = self.direction.write_at(direction, 0) {
			error!("GPIO {}: failed to set direction {:?}: {}", self.number, String::from_utf8_lossy(direction), e);
		}
	}

	pub fn drive_low(&mut self) {
		self.set_direction(DIRECTION_LOW);
	}

	pub fn release(&mut self) {
		self.set_direction(DIRECTION_IN);
	}

	/// Reads the line level; on I/O errors the line is reported high
	/// (released).
	pub fn sample(&mut self) -> bool {
		let mut buf = [0u8];
		match self.value.read_at(&mut buf, 0) {
			Ok(1) => buf[0] != b'0',
			Ok(_) => {
				error!("GPIO {}: empty read from value", self.number);
				true
			},
			Err(e) => {
				error!("GPIO {}: failed to read value: {}", self.number, e);
				true
			},
		}
	}
}

impl Drop for SysfsPin {
	fn drop(&mut self) {
		self.release();
		if self.exported {
			let res = fs::OpenOptions::new().write(true).open(self.root.join("unexport"))
				.and_then(|mut f| f.write_all(self.number.to_string().as_bytes()));
			if let Err(e) = res {
				warn!("GPIO {}: failed to unexport: {}", self.number, e);
			}
		}
	}
}

/// SDA and SCL on two sysfs GPIOs.
#[derive(Debug)]
pub struct SysfsLines {
	sda: SysfsPin,
	scl: SysfsPin,
}

impl SysfsLines {
	/// Opens (exporting if needed) both pins and releases them, leaving
	/// the bus idle.
	pub fn open(sda: u32, scl: u32) -> crate::AResult<Self> {
		Self::open_in(Path::new(GPIO_ROOT), sda, scl)
	}

	pub(super) fn open_in(root: &Path, sda: u32, scl: u32) -> crate::AResult<Self> {
		ensure!(sda != scl, "SDA and SCL must be different GPIOs (both {})", sda);
		let scl = SysfsPin::open_in(root, scl)?;
		let sda = SysfsPin::open_in(root, sda)?;
		debug!("sysfs lines: SDA on GPIO {}, SCL on GPIO {}", sda.number(), scl.number());
		Ok(SysfsLines { sda, scl })
	}
}

impl Lines for SysfsLines {
	fn drive_sda_low(&mut self) {
		self.sda.drive_low()
	}

	fn release_sda(&mut self) {
		self.sda.release()
	}

	fn drive_scl_low(&mut self) {
		self.scl.drive_low()
	}

	fn release_scl(&mut self) {
		self.scl.release()
	}

	fn sample_sda(&mut self) -> bool {
		self.sda.sample()
	}
}
