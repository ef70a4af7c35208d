use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A row of the `tokens` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token_id: i64,
    pub name: String,
    pub symbol: String,
    pub total_supply: Decimal,
    pub creator_address: String,
    pub timestamp: i64,
}

/// One entry of a `get_balance_of_address` token-balance map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBalanceRow {
    pub token_id: i64,
    pub symbol: String,
    pub balance: Decimal,
}

/// The full balance view for a single address: native plus every token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddressBalance {
    pub native: Decimal,
    pub tokens: Vec<TokenBalanceRow>,
}
