pub mod apartment;
pub mod booking;
pub mod finance;
pub mod invoice;
pub mod user;

pub use apartment::*;
pub use booking::*;
pub use finance::*;
pub use invoice::*;
pub use user::*;
