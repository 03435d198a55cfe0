#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;

macro_rules! with_context {
	(( $fmt:tt $($t:tt)* ), $e:expr) => {{
		use failure::Error;

		match (|| { $e })() {
			Ok(v) => Ok(v),
			Err(e) => {
				let e: Error = e;
				let msg = format!(concat!($fmt, ": {}") $($t)*, e);
				Err(Error::from(e.context(msg)))
			}
		}
	}};

	($msg:expr, $e:expr) => {
		with_context!(("{}", $msg), $e)
	};
}

pub type AResult<T> = Result<T, failure::Error>;

pub mod lines;
pub mod master;
pub mod sim;
pub mod ticker;

pub use self::lines::Lines;
pub use self::master::{
	Address,
	Channel,
	Mode,
	Nack,
	Outcome,
};
pub use self::ticker::{
	Ticker,
	TickerConfig,
};
