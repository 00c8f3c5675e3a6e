use alloy_sol_types::sol;

pub mod crypto;
pub mod deposit;
pub mod error;
pub mod fee;
pub mod field;
pub mod merkle_tree;
pub mod note;
pub mod units;
pub mod witness;

sol! {
    /// The pool contract: one instance per (currency, amount) denomination.
    interface ISmashnado {
        event Deposit(bytes32 indexed commitment, uint32 leafIndex, uint256 timestamp);
        event Withdrawal(address to, bytes32 nullifierHash, address indexed relayer, uint256 fee);

        function deposit(bytes32 commitment) external payable;
        function withdraw(
            bytes proof,
            bytes32 root,
            bytes32 nullifierHash,
            address recipient,
            address relayer,
            uint256 fee,
            uint256 refund
        ) external payable;
        function isKnownRoot(bytes32 root) external view returns (bool);
        function isSpent(bytes32 nullifierHash) external view returns (bool);
        function token() external view returns (address);
    }

    interface IERC20 {
        function balanceOf(address owner) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }
}

pub use crypto::{zero_value, Hasher, PoseidonHasher};
pub use deposit::Deposit;
pub use error::{Error, Result};
pub use fee::{compute_fee, FeeParams};
pub use merkle_tree::{reconstruct, BlockContext, DepositEvent, MerkleProof, MerkleTree};
pub use note::Note;
pub use witness::{encode_for_submission, CallArguments, ProofBlob, PublicInputs, WithdrawalWitness};
