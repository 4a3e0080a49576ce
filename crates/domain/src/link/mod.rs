mod state;

pub use state::LinkState;
