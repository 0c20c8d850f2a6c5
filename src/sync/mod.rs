pub mod poller;
pub mod seen;

pub use poller::{history_interval, PollLoop};
pub use seen::SeenSet;
