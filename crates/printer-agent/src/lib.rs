//! Host process pieces that are worth testing outside `main`

pub mod startup;
