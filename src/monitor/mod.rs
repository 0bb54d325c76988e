//! Background machinery of the live screens: polling, chart series and the
//! worker shell relay.

mod poll;
pub use poll::*;

mod aggregate;
pub use aggregate::*;

mod terminal;
pub use terminal::*;
