mod builder;
mod driver;
mod mock;
pub mod registers;
#[cfg(feature = "imaging")]
mod replay;
mod simulated;

pub use builder::CameraBuilder;
pub use driver::{CameraDriver, GrabTimeout};
pub use mock::{MockCall, MockCallLog, MockCamera};
#[cfg(feature = "imaging")]
pub use replay::ReplayCamera;
pub use simulated::SimulatedCamera;
