pub mod local;

pub use local::TasksLocalClient;
