//! Chain classification.
//!
//! Maps a token address to its general chain family by surface format
//! alone — no network calls, no state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// General chain family a token address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Chain {
    Svm,
    Evm,
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Chain::Svm => write!(f, "SVM"),
            Chain::Evm => write!(f, "EVM"),
        }
    }
}

/// Fine-grained chain identity. Every SVM token's specific chain is `Svm`;
/// an EVM token's specific chain is discovered empirically by the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecificChain {
    Eth,
    Polygon,
    Bsc,
    Arbitrum,
    Optimism,
    Avalanche,
    Base,
    Linea,
    Zksync,
    Scroll,
    Mantle,
    Svm,
}

impl SpecificChain {
    /// All EVM specific chains in the order they should be tried absent
    /// a memoized or hinted chain. Mirrors `Config::evm_chains`' default.
    pub const DEFAULT_EVM_ORDER: &'static [SpecificChain] = &[
        SpecificChain::Eth,
        SpecificChain::Polygon,
        SpecificChain::Bsc,
        SpecificChain::Arbitrum,
        SpecificChain::Optimism,
        SpecificChain::Avalanche,
        SpecificChain::Base,
        SpecificChain::Linea,
        SpecificChain::Zksync,
        SpecificChain::Scroll,
        SpecificChain::Mantle,
    ];

    pub fn general_chain(&self) -> Chain {
        match self {
            SpecificChain::Svm => Chain::Svm,
            _ => Chain::Evm,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SpecificChain::Eth => "eth",
            SpecificChain::Polygon => "polygon",
            SpecificChain::Bsc => "bsc",
            SpecificChain::Arbitrum => "arbitrum",
            SpecificChain::Optimism => "optimism",
            SpecificChain::Avalanche => "avalanche",
            SpecificChain::Base => "base",
            SpecificChain::Linea => "linea",
            SpecificChain::Zksync => "zksync",
            SpecificChain::Scroll => "scroll",
            SpecificChain::Mantle => "mantle",
            SpecificChain::Svm => "svm",
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eth" | "ethereum" => Some(SpecificChain::Eth),
            "polygon" => Some(SpecificChain::Polygon),
            "bsc" => Some(SpecificChain::Bsc),
            "arbitrum" => Some(SpecificChain::Arbitrum),
            "optimism" => Some(SpecificChain::Optimism),
            "avalanche" => Some(SpecificChain::Avalanche),
            "base" => Some(SpecificChain::Base),
            "linea" => Some(SpecificChain::Linea),
            "zksync" => Some(SpecificChain::Zksync),
            "scroll" => Some(SpecificChain::Scroll),
            "mantle" => Some(SpecificChain::Mantle),
            "svm" | "solana" => Some(SpecificChain::Svm),
            _ => None,
        }
    }
}

impl fmt::Display for SpecificChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A 42-character `0x`-prefixed hex string is EVM; anything else is SVM.
/// Never fails — malformed input classifies as SVM and is left for
/// downstream providers to reject with a null price.
pub fn classify_chain(address: &str) -> Chain {
    if is_evm_address(address) {
        Chain::Evm
    } else {
        Chain::Svm
    }
}

fn is_evm_address(address: &str) -> bool {
    let Some(hex) = address.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Normalizes a token address for use as a cache/database/comparison key.
/// EVM addresses are lower-cased; SVM (base58) addresses are case-sensitive
/// and returned verbatim.
pub fn normalize_address(address: &str) -> String {
    match classify_chain(address) {
        Chain::Evm => address.to_ascii_lowercase(),
        Chain::Svm => address.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn evm_address_classifies_as_evm() {
        assert_eq!(
            classify_chain("0xd9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA"),
            Chain::Evm
        );
    }

    #[test]
    fn solana_address_classifies_as_svm() {
        assert_eq!(
            classify_chain("So11111111111111111111111111111111111111112"),
            Chain::Svm
        );
    }

    #[test]
    fn malformed_address_defaults_to_svm() {
        assert_eq!(classify_chain(""), Chain::Svm);
        assert_eq!(classify_chain("0xshort"), Chain::Svm);
        assert_eq!(classify_chain("not-an-address-at-all"), Chain::Svm);
    }

    #[test]
    fn classifier_is_idempotent() {
        let addr = "0xD9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA";
        assert_eq!(classify_chain(addr), classify_chain(&addr.to_lowercase()));
    }

    #[test]
    fn normalize_is_case_insensitive_for_evm_only() {
        let evm = "0xD9aAEc86B65D86f6A7B5B1b0c42FFA531710b6CA";
        assert_eq!(normalize_address(evm), evm.to_lowercase());

        let svm = "So11111111111111111111111111111111111111112";
        assert_eq!(normalize_address(svm), svm);
    }

    #[test]
    fn specific_chain_round_trips_through_str() {
        for chain in SpecificChain::DEFAULT_EVM_ORDER {
            let s = chain.as_str();
            assert_eq!(SpecificChain::from_str_opt(s), Some(*chain));
        }
        assert_eq!(SpecificChain::from_str_opt("svm"), Some(SpecificChain::Svm));
        assert_eq!(SpecificChain::from_str_opt("bogus"), None);
    }
}
