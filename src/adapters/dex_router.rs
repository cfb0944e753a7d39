//! Uniswap-V2-style router quotes
//!
//! Quotes one whole token through `token -> WETH -> USDC` (or `WETH -> USDC`
//! for WETH itself) with `getAmountsOut`, and reads the USD price off the
//! final USDC amount. Every router built from this type walks the same path
//! with the same decimal scaling, so two routes are directly comparable.

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::sol;
use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::debug;

use super::traits::PriceFeed;
use crate::domain::numeric::from_base_units;
use crate::error::{Result, WatchError};

sol! {
    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IUniswapV2Router02 {
        function getAmountsOut(uint256 amountIn, address[] calldata path)
            external
            view
            returns (uint256[] memory amounts);
    }

    #[allow(missing_docs)]
    #[sol(rpc)]
    interface IERC20Metadata {
        function decimals() external view returns (uint8);
    }
}

/// Intermediate and quote assets shared by every route
#[derive(Debug, Clone, Copy)]
pub struct QuoteAssets {
    pub weth: Address,
    pub usdc: Address,
    pub usdc_decimals: u8,
}

/// Parse a hex address, reporting failures as configuration errors.
pub fn parse_address(value: &str) -> Result<Address> {
    Address::from_str(value.trim())
        .map_err(|e| WatchError::configuration(format!("invalid address {}: {}", value, e)))
}

/// Price feed backed by one V2-compatible router contract
pub struct DexRouterFeed<P> {
    name: String,
    router: Address,
    assets: QuoteAssets,
    provider: P,
    /// token -> ERC-20 decimals, read once
    decimals: DashMap<Address, u8>,
}

impl<P> DexRouterFeed<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, router: Address, assets: QuoteAssets, provider: P) -> Self {
        Self {
            name: name.into(),
            router,
            assets,
            provider,
            decimals: DashMap::new(),
        }
    }

    /// Swap path used to price `token` in USDC.
    pub fn route_path(&self, token: Address) -> Vec<Address> {
        route_path(token, &self.assets)
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        if let Some(cached) = self.decimals.get(&token) {
            return Ok(*cached);
        }

        let erc20 = IERC20Metadata::new(token, self.provider.clone());
        let decimals = erc20.decimals().call().await.map_err(|e| {
            WatchError::provider(format!("{}: decimals() failed for {}: {}", self.name, token, e))
        })?;

        debug!(route = %self.name, %token, decimals, "Cached token decimals");
        self.decimals.insert(token, decimals);
        Ok(decimals)
    }
}

fn route_path(token: Address, assets: &QuoteAssets) -> Vec<Address> {
    if token == assets.weth {
        vec![assets.weth, assets.usdc]
    } else {
        vec![token, assets.weth, assets.usdc]
    }
}

#[async_trait]
impl<P> PriceFeed for DexRouterFeed<P>
where
    P: Provider + Clone + Send + Sync + 'static,
{
    async fn price(&self, token: &str) -> Result<Decimal> {
        let token = parse_address(token)?;
        let decimals = self.token_decimals(token).await?;

        // One whole token in base units
        let amount_in = U256::from(10u64).pow(U256::from(decimals));
        let path = self.route_path(token);

        let router = IUniswapV2Router02::new(self.router, self.provider.clone());
        let amounts = router
            .getAmountsOut(amount_in, path)
            .call()
            .await
            .map_err(|e| {
                WatchError::provider(format!(
                    "{}: getAmountsOut failed for {}: {}",
                    self.name, token, e
                ))
            })?;

        let out = amounts.last().copied().ok_or_else(|| {
            WatchError::inconsistent(format!("{}: router returned no amounts", self.name))
        })?;
        let raw = u128::try_from(out).map_err(|_| {
            WatchError::inconsistent(format!("{}: quote {} overflows u128", self.name, out))
        })?;

        let price = from_base_units(raw, u32::from(self.assets.usdc_decimals))?;
        if price <= Decimal::ZERO {
            return Err(WatchError::inconsistent(format!(
                "{}: zero quote for {}",
                self.name, token
            )));
        }

        debug!(route = %self.name, %token, %price, "Router quote");
        Ok(price)
    }
}
