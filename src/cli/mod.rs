pub mod rates;
pub mod ui;
pub mod value;
