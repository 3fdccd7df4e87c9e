//! Setting handlers for different configuration patterns.

pub mod boolean;
pub mod numeric;
pub mod parameter;
pub mod persona;
pub mod string;

pub use boolean::*;
pub use numeric::*;
pub use parameter::*;
pub use persona::*;
pub use string::*;
