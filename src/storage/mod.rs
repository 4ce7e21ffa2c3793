pub mod files;
pub mod memory;
pub mod state;
pub mod traits;

pub use files::FileBackupStore;
pub use memory::InMemoryBackupStore;
pub use state::StateFiles;
pub use traits::BackupStore;
