mod sysfs;

pub use self::sysfs::{
	SysfsLines,
	SysfsPin,
};

/// Open-drain line control for one bus.
///
/// Nothing ever drives a line high: "releasing" switches the pin to input
/// (high impedance) and the external pull-up does the rest, unless some
/// other party on the bus holds the line low.
///
/// All operations are called from the tick context; they must not block and
/// should complete within a small fraction of a quarter bit period.
pub trait Lines {
	fn drive_sda_low(&mut self);
	fn release_sda(&mut self);
	fn drive_scl_low(&mut self);
	fn release_scl(&mut self);

	// instantaneous SDA level; `true` is high
	fn sample_sda(&mut self) -> bool;

	fn set_sda(&mut self, high: bool) {
		if high {
			self.release_sda();
		} else {
			self.drive_sda_low();
		}
	}
}
