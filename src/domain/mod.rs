pub mod channel;
pub mod relay;
pub mod sensor;

pub use channel::*;
pub use relay::*;
pub use sensor::*;
