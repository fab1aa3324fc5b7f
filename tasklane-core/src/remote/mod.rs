pub mod process;
pub mod protocol;

pub use process::ProviderProcess;
