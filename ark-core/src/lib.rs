pub mod constants;
pub mod forfeit_message;
pub mod lift;
pub mod pool;
pub mod redeem;
pub mod vtxo;
pub mod wallet;

mod error;

pub use error::Error;
pub use error::ErrorContext;
pub use forfeit_message::forfeit_witness;
pub use forfeit_message::hash_forfeit_message;
pub use forfeit_message::sign_forfeit_message;
pub use forfeit_message::verify_forfeit_message_signature;
pub use forfeit_message::ForfeitMessage;
pub use lift::create_lift_transaction;
pub use lift::LiftArgs;
pub use lift::LiftOrderResult;
pub use lift::LiftTransaction;
pub use pool::create_pool_transaction;
pub use pool::StakeholderLeaves;
pub use pool::UnsignedPoolTransaction;
pub use pool::VirtualTransfer;
pub use redeem::make_redeem_transaction;
pub use redeem::redeem_finalizer;
pub use redeem::RedeemTransaction;
pub use vtxo::validate as validate_vtxo;
pub use vtxo::ExtendedVirtualUtxo;
pub use vtxo::RedeemTaprootTree;
pub use vtxo::VirtualUtxo;
pub use vtxo::VirtualUtxoTaprootTree;
pub use vtxo::WitnessUtxo;
pub use wallet::CoinSelection;
pub use wallet::UpdaterInput;
pub use wallet::UpdaterOutput;
pub use wallet::Wallet;
