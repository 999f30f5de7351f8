mod lock;

pub use lock::{MutexExt, RwLockExt};
