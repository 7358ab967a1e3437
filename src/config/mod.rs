pub mod settings;

pub use settings::{load_credential, Settings};
