// Statement export. The transport side of the engine's read surface;
// no business logic lives here.

pub mod export;

pub use export::*;
