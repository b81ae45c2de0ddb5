pub mod chart_pointer;
pub mod device;
pub mod reading;

pub use chart_pointer::ChartPointer;
pub use device::{AuthStatus, Device, DeviceCategory, NewDevice};
pub use reading::{CollectedAt, Reading};
