//! Protocol constants and per-network parameters.

use crate::types::Hash256;

/// Network type: Mainnet, Testnet, or Regtest.
///
/// Controls magic bytes, default ports, data directory suffix, the genesis
/// block hash, and which public key is trusted to sign checkpoints.
///
/// # Examples
///
/// ```
/// use keel_core::constants::NetworkType;
/// let net = NetworkType::default();
/// assert_eq!(net, NetworkType::Mainnet);
/// assert_eq!(net.magic_bytes(), *b"KEEL");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NetworkType {
    /// Production network.
    #[default]
    Mainnet,
    /// Public test network.
    Testnet,
    /// Local regression-test network. Its checkpoint master secret is public.
    Regtest,
}

impl NetworkType {
    /// Four-byte network identifier prepended to all P2P messages.
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_core::constants::NetworkType;
    /// assert_eq!(NetworkType::Mainnet.magic_bytes(), *b"KEEL");
    /// assert_eq!(NetworkType::Testnet.magic_bytes(), *b"TEST");
    /// assert_eq!(NetworkType::Regtest.magic_bytes(), *b"REGT");
    /// ```
    pub fn magic_bytes(&self) -> [u8; 4] {
        match self {
            Self::Mainnet => [0x4B, 0x45, 0x45, 0x4C], // "KEEL"
            Self::Testnet => [0x54, 0x45, 0x53, 0x54], // "TEST"
            Self::Regtest => [0x52, 0x45, 0x47, 0x54], // "REGT"
        }
    }

    /// Default TCP port for the JSON-RPC server.
    ///
    /// # Examples
    ///
    /// ```
    /// use keel_core::constants::NetworkType;
    /// assert_eq!(NetworkType::Mainnet.default_rpc_port(), 19332);
    /// ```
    pub fn default_rpc_port(&self) -> u16 {
        match self {
            Self::Mainnet => 19332,
            Self::Testnet => 29332,
            Self::Regtest => 39332,
        }
    }

    /// Subdirectory name appended to the base data directory path.
    pub fn data_dir_suffix(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Regtest => "regtest",
        }
    }

    /// Hash of the genesis block. Key rotation resets the checkpoint here.
    pub fn genesis_hash(&self) -> Hash256 {
        match self {
            Self::Mainnet => Hash256(MAINNET_GENESIS),
            Self::Testnet => Hash256(TESTNET_GENESIS),
            Self::Regtest => Hash256(REGTEST_GENESIS),
        }
    }

    /// Hex-encoded ed25519 public key of the checkpoint master.
    ///
    /// Fixed per deployment. A node whose persisted key differs from this
    /// value treats startup as a key rotation.
    pub fn checkpoint_pubkey(&self) -> &'static str {
        match self {
            Self::Mainnet => MAINNET_CHECKPOINT_PUBKEY,
            Self::Testnet => TESTNET_CHECKPOINT_PUBKEY,
            Self::Regtest => REGTEST_CHECKPOINT_PUBKEY,
        }
    }
}

const MAINNET_GENESIS: [u8; 32] = [
    0x43, 0xfe, 0xa4, 0x52, 0x6b, 0x86, 0xea, 0x03, 0x2a, 0x3b, 0x6d, 0xee, 0x82, 0x79, 0x69, 0xd8,
    0x6f, 0xef, 0x6b, 0x3a, 0x3d, 0x68, 0xdb, 0x00, 0x86, 0xcd, 0xb9, 0xc9, 0xb8, 0xfa, 0x26, 0x34,
];

const TESTNET_GENESIS: [u8; 32] = [
    0xf7, 0x16, 0x6b, 0x51, 0x7e, 0x23, 0x7b, 0x65, 0x23, 0x77, 0x7a, 0x9a, 0xb6, 0xd0, 0xe1, 0xbe,
    0xd6, 0x7e, 0xd8, 0xbd, 0xc7, 0xf6, 0x2b, 0x3a, 0x64, 0x02, 0x9d, 0xbd, 0x76, 0x72, 0xd0, 0x22,
];

const REGTEST_GENESIS: [u8; 32] = [
    0xbf, 0xfb, 0xa9, 0x2a, 0x22, 0x09, 0xf1, 0xe1, 0x46, 0x4c, 0xbb, 0x7f, 0xfc, 0x26, 0x57, 0x05,
    0x2b, 0x1a, 0x98, 0xa2, 0x50, 0xe2, 0x0a, 0xd5, 0x57, 0xd2, 0x69, 0xdb, 0x88, 0x4a, 0xe3, 0x84,
];

pub const MAINNET_CHECKPOINT_PUBKEY: &str =
    "ba9fdac796b6cc53afb497d42d7b51741083c5092bf3961a607ef27f6751cfc3";
pub const TESTNET_CHECKPOINT_PUBKEY: &str =
    "714dc9f9a700f5d99d3e0b1653f7f086009cd0ab88f3861394ac604c33aec4a5";
pub const REGTEST_CHECKPOINT_PUBKEY: &str =
    "aa8791258f0894c95502ce003600a0227dc8a0ef7ee95ad04ed540b65e816e05";

/// Regtest checkpoint master secret. Published so local networks can run a
/// master node; never trusted on mainnet or testnet.
pub const REGTEST_CHECKPOINT_MASTER_KEY: &str =
    "220fc5bc70c683cd78bc0d520c6006caab111e2a9db4d58f4d2b277fce9487e7";

/// Current version of the unsigned checkpoint payload.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Exact byte length of an encoded unsigned checkpoint (u32 + 32-byte hash).
pub const CHECKPOINT_PAYLOAD_SIZE: usize = 4 + 32;

/// Minimum safe auto-checkpoint depth. Shallower policies are rejected.
pub const MIN_CHECKPOINT_DEPTH: u64 = 5;

/// Default auto-checkpoint depth.
pub const DEFAULT_CHECKPOINT_DEPTH: u64 = MIN_CHECKPOINT_DEPTH;

/// Maximum checkpoint wire message size in bytes before decoding is attempted.
pub const MAX_CHECKPOINT_MESSAGE_SIZE: usize = 1024;
