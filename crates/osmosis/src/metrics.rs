//! Pool TVL and APY

use rust_decimal::Decimal;
use std::time::Duration;

use qoracle_core::{Coin, CoreError, CoreResult, DenomPrices};

use crate::types::{ChainParamsSnapshot, DistrInfo, IncentivizedPool};

const YEAR: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Σ amount × price over the pool assets
pub fn calculate_pool_tvl(assets: &[Coin], prices: &DenomPrices) -> CoreResult<Decimal> {
    assets.iter().try_fold(Decimal::ZERO, |tvl, coin| {
        let value = coin
            .amount_dec()?
            .checked_mul(prices.get(&coin.denom)?)
            .ok_or_else(|| CoreError::Overflow(format!("value of {coin}")))?;
        tvl.checked_add(value)
            .ok_or_else(|| CoreError::Overflow("pool tvl".to_string()))
    })
}

/// APY of incentivized pools, from the cached chain params and the price cache
pub struct ApyCalculator<'a> {
    incentivized_pools: &'a [IncentivizedPool],
    distr_info: &'a DistrInfo,
    /// Yearly pool incentives, in mint denom price units
    annual_incentives_value: Decimal,
}

impl<'a> ApyCalculator<'a> {
    pub fn new(snapshot: &'a ChainParamsSnapshot, prices: &DenomPrices) -> CoreResult<Self> {
        let mint_params = snapshot
            .mint_params
            .as_ref()
            .ok_or_else(|| CoreError::RemoteDataMissing("mint params".to_string()))?;
        let epoch_provisions = snapshot
            .epoch_provisions
            .ok_or_else(|| CoreError::RemoteDataMissing("mint epoch provisions".to_string()))?;
        let distr_info = snapshot
            .distr_info
            .as_ref()
            .ok_or_else(|| CoreError::RemoteDataMissing("distribution info".to_string()))?;

        let mint_epoch = snapshot
            .epochs
            .iter()
            .find(|e| e.identifier == mint_params.epoch_identifier)
            .ok_or_else(|| CoreError::EpochNotFound(mint_params.epoch_identifier.clone()))?;
        let epoch_nanos = mint_epoch.duration.as_nanos();
        if epoch_nanos == 0 {
            return Err(CoreError::DivideByZero(format!("epoch {} has zero duration", mint_epoch.identifier)));
        }
        let annual_epochs = Decimal::from(u64::try_from(YEAR.as_nanos() / epoch_nanos).unwrap_or(u64::MAX));

        let overflow = || CoreError::Overflow("annual pool incentives".to_string());
        let annual_incentives = epoch_provisions
            .checked_mul(annual_epochs)
            .and_then(|v| v.checked_mul(mint_params.pool_incentives_proportion))
            .ok_or_else(overflow)?;
        let annual_incentives_value = annual_incentives
            .checked_mul(prices.get(&mint_params.mint_denom)?)
            .ok_or_else(overflow)?;

        Ok(Self {
            incentivized_pools: &snapshot.incentivized_pools,
            distr_info,
            annual_incentives_value,
        })
    }

    /// Sum of the distribution weights of every gauge incentivizing the pool
    fn pool_weight(&self, pool_id: u64) -> CoreResult<Decimal> {
        let mut weight = Decimal::ZERO;
        for incentive in self.incentivized_pools.iter().filter(|p| p.pool_id == pool_id) {
            let gauge_weight = self
                .distr_info
                .gauge_weight(incentive.gauge_id)
                .ok_or(CoreError::GaugeWeightNotFound(incentive.gauge_id))?;
            weight += qoracle_core::types::int_to_dec(gauge_weight)?;
        }
        Ok(weight)
    }

    /// APY in percent
    pub fn calculate(&self, pool_id: u64, tvl: Decimal) -> CoreResult<Decimal> {
        let total_weight = qoracle_core::types::int_to_dec(self.distr_info.total_weight)?;
        if total_weight.is_zero() {
            return Err(CoreError::DivideByZero("distribution total weight".to_string()));
        }
        if tvl.is_zero() {
            return Err(CoreError::DivideByZero(format!("tvl of pool {pool_id}")));
        }

        let overflow = || CoreError::Overflow(format!("apy of pool {pool_id}"));
        self.annual_incentives_value
            .checked_mul(self.pool_weight(pool_id)?)
            .and_then(|v| v.checked_div(total_weight))
            .and_then(|v| v.checked_div(tvl))
            .and_then(|v| v.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DistrRecord, EpochInfo, MintParams};
    use qoracle_core::Int;
    use rust_decimal_macros::dec;

    fn prices() -> DenomPrices {
        let mut prices = DenomPrices::new(None);
        prices.insert("uatom", dec!(15));
        prices.insert("uosmo", dec!(50));
        prices.insert("stake", dec!(2));
        prices
    }

    fn incentive(pool_id: u64, gauge_id: u64) -> IncentivizedPool {
        IncentivizedPool {
            pool_id,
            lockable_duration: Duration::from_secs(86_400),
            gauge_id,
        }
    }

    fn snapshot() -> ChainParamsSnapshot {
        ChainParamsSnapshot {
            epochs: vec![EpochInfo {
                identifier: "day".to_string(),
                duration: Duration::from_secs(86_400),
                current_epoch: 1,
                current_epoch_start_height: 1,
            }],
            mint_params: Some(MintParams {
                mint_denom: "stake".to_string(),
                epoch_identifier: "day".to_string(),
                pool_incentives_proportion: dec!(0.25),
            }),
            epoch_provisions: Some(dec!(1000)),
            incentivized_pools: vec![incentive(1, 1), incentive(1, 2), incentive(2, 3)],
            distr_info: Some(DistrInfo {
                total_weight: Int::from(100u64),
                records: [(1u64, 10u64), (2, 20), (3, 70)]
                    .into_iter()
                    .map(|(gauge_id, weight)| DistrRecord {
                        gauge_id,
                        weight: Int::from(weight),
                    })
                    .collect(),
            }),
        }
    }

    #[test]
    fn test_pool_tvl() {
        let assets = vec![Coin::new("uatom", 200), Coin::new("uosmo", 100)];
        assert_eq!(calculate_pool_tvl(&assets, &prices()).unwrap(), dec!(8000));

        let assets = vec![Coin::new("uatom", 200), Coin::new("ujuno", 1)];
        assert!(matches!(calculate_pool_tvl(&assets, &prices()), Err(CoreError::PriceNotFound(d)) if d == "ujuno"));
    }

    #[test]
    fn test_pool_apy() {
        let snapshot = snapshot();
        let calculator = ApyCalculator::new(&snapshot, &prices()).unwrap();
        // 1000 * 365 * 0.25 * 30 / 100 * 2 / 8000 * 100
        assert_eq!(calculator.calculate(1, dec!(8000)).unwrap(), dec!(684.375));
        // Pool without gauges earns nothing
        assert_eq!(calculator.calculate(9, dec!(8000)).unwrap(), Decimal::ZERO);
        assert!(matches!(calculator.calculate(1, Decimal::ZERO), Err(CoreError::DivideByZero(_))));
    }

    #[test]
    fn test_apy_errors() {
        let mut missing_epoch = snapshot();
        missing_epoch.epochs.clear();
        assert!(matches!(ApyCalculator::new(&missing_epoch, &prices()), Err(CoreError::EpochNotFound(_))));

        let mut missing_gauge = snapshot();
        missing_gauge.incentivized_pools.push(incentive(1, 42));
        let calculator = ApyCalculator::new(&missing_gauge, &prices()).unwrap();
        assert!(matches!(calculator.calculate(1, dec!(10)), Err(CoreError::GaugeWeightNotFound(42))));

        let mut no_mint_price = DenomPrices::new(None);
        no_mint_price.insert("uatom", dec!(15));
        assert!(matches!(ApyCalculator::new(&snapshot(), &no_mint_price), Err(CoreError::PriceNotFound(_))));

        let mut no_distr = snapshot();
        no_distr.distr_info = None;
        assert!(matches!(ApyCalculator::new(&no_distr, &prices()), Err(CoreError::RemoteDataMissing(_))));
    }
}
