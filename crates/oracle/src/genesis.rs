//! Genesis configuration
//!
//! Loaded from an optional file plus `QORACLE__*` environment overrides, e.g.
//! `QORACLE__BANDCHAIN__IBC__AUTHORIZED_CHANNEL=channel-3`.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

use qoracle_core::{load_config, Context, CoreError, CoreResult, DenomSymbolMapping};

use crate::module::QOracleModule;
use crate::types::{default_denom_mappings, Params};

pub const ENV_PREFIX: &str = "QORACLE";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenesisConfig {
    pub params: Params,
    pub denom_mappings: Vec<DenomSymbolMapping>,
    pub bandchain: qoracle_bandchain::Params,
    pub osmosis: qoracle_osmosis::Params,
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            params: Params::default(),
            denom_mappings: default_denom_mappings(),
            bandchain: qoracle_bandchain::Params::default(),
            osmosis: qoracle_osmosis::Params::default(),
        }
    }
}

impl GenesisConfig {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let genesis: Self = load_config(path, ENV_PREFIX)?;
        genesis.validate().context("Invalid genesis configuration")?;
        Ok(genesis)
    }

    pub fn validate(&self) -> CoreResult<()> {
        self.params.validate()?;

        let mut denoms = BTreeSet::new();
        for mapping in &self.denom_mappings {
            mapping.validate()?;
            if !denoms.insert(mapping.denom.as_str()) {
                return Err(CoreError::InvalidMapping(format!("duplicate mapping for denom {}", mapping.denom)));
            }
        }

        self.bandchain.validate()?;
        self.osmosis.validate()
    }
}

pub fn init_genesis(ctx: &mut Context, module: &QOracleModule, genesis: &GenesisConfig) -> CoreResult<()> {
    genesis.validate()?;

    let keeper = module.keeper();
    keeper.set_params(ctx, &genesis.params)?;
    for mapping in &genesis.denom_mappings {
        keeper.set_denom_mapping_unchecked(ctx, mapping)?;
    }
    module.bandchain().set_params(ctx, &genesis.bandchain)?;
    module.osmosis().set_params(ctx, &genesis.osmosis)?;

    info!(
        target: "x/qoracle",
        authority = %genesis.params.authority,
        mappings = genesis.denom_mappings.len(),
        "Initialized qoracle genesis"
    );
    Ok(())
}

pub fn export_genesis(ctx: &Context, module: &QOracleModule) -> CoreResult<GenesisConfig> {
    Ok(GenesisConfig {
        params: module.keeper().params(ctx)?,
        denom_mappings: module.keeper().denom_mappings(ctx)?,
        bandchain: module.bandchain().params(ctx)?,
        osmosis: module.osmosis().params(ctx)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use qoracle_bandchain::BandchainKeeper;
    use qoracle_core::testutil::{header_at, MockTransport};
    use qoracle_core::MultiStore;
    use qoracle_osmosis::OsmosisKeeper;
    use rust_decimal_macros::dec;

    fn genesis() -> GenesisConfig {
        let mut genesis = GenesisConfig::default();
        genesis.params.authority = "quasar1gov".to_string();
        genesis
    }

    #[test]
    fn test_default_genesis_needs_authority() {
        assert!(GenesisConfig::default().validate().is_err());
        assert!(genesis().validate().is_ok());

        let mut duplicate = genesis();
        duplicate
            .denom_mappings
            .push(DenomSymbolMapping::new("uatom", "ATOM", dec!(1)));
        assert!(matches!(duplicate.validate(), Err(CoreError::InvalidMapping(_))));
    }

    #[test]
    fn test_init_and_export() {
        let module = QOracleModule::new(BandchainKeeper::default(), OsmosisKeeper::default()).unwrap();
        let mut stores = MultiStore::new();
        let mut transport = MockTransport::default();
        let mut ctx = Context::new(header_at(0), &mut stores, &mut transport);

        let mut genesis = genesis();
        genesis.bandchain.ibc.authorized_channel = "channel-2".to_string();
        genesis.osmosis.epoch_identifier = "day".to_string();
        init_genesis(&mut ctx, &module, &genesis).unwrap();

        assert_eq!(export_genesis(&ctx, &module).unwrap(), genesis);
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join(format!("qoracle-genesis-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{
                "params": {"authority": "quasar1gov"},
                "denom_mappings": [{"denom": "ujuno", "oracle_symbol": "JUNO", "multiplier": "0.000001"}],
                "bandchain": {"coin_rates": {"symbols": ["JUNO"]}},
                "osmosis": {"ibc": {"authorized_channel": "channel-7"}}
            }"#,
        )
        .unwrap();

        let genesis = GenesisConfig::load(Some(path.as_path())).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(genesis.params.authority, "quasar1gov");
        assert_eq!(genesis.denom_mappings, vec![DenomSymbolMapping::new("ujuno", "JUNO", dec!(0.000001))]);
        assert_eq!(genesis.bandchain.coin_rates.symbols, vec!["JUNO".to_string()]);
        assert_eq!(genesis.bandchain.coin_rates.script_params.ask_count, 4);
        assert_eq!(genesis.osmosis.ibc.authorized_channel, "channel-7");
        assert!(genesis.osmosis.enabled);
    }
}
