/// Scrolling table with a selected row.
mod table;
pub use table::{SelectTable, SelectionState};

/// Popup form of labelled inputs.
mod form;
pub use form::{FormAction, FormField, FormState, draw_form};

/// Renders a VT100 screen.
mod terminal;
pub use terminal::TerminalView;
