pub mod dataloader;
pub mod example;
pub mod prediction;
pub mod qa_system;

pub use dataloader::*;
pub use example::*;
pub use prediction::*;
pub use qa_system::*;
