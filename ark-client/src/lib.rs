pub mod chain_source;
pub mod pool_manager;
pub mod pool_watcher;
pub mod repository;

mod error;
mod utils;

pub use chain_source::fetch_transactions;
pub use chain_source::ChainSource;
pub use chain_source::Unspent;
pub use error::Error;
pub use error::ErrorContext;
pub use pool_manager::PoolManager;
pub use pool_manager::PoolManagerConfig;
pub use pool_manager::SendRequestResponse;
pub use pool_watcher::PoolWatcher;
pub use pool_watcher::PoolWatcherConfig;
pub use repository::InMemoryRepository;
pub use repository::PoolManagerRepository;
pub use repository::PoolWatcherRepository;
pub use repository::StoredForfeit;
pub use repository::StoredPoolTransaction;
