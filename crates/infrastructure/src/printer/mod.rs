pub mod receipt_builder;

pub use receipt_builder::ReceiptBuilder;
