//! Start-time validation.
//!
//! [`resolve_spec`] turns a profile plus catalog into a [`MineSpec`], or the
//! first reason mining cannot start. Checks run in a fixed order so the
//! reported reason is always the most fundamental one.

use crate::catalog::{Catalog, Kernel, KernelInput};
use crate::context::{CoinSelection, MineSpec};
use crate::error::StartMineError;
use crate::gpus::GpuSet;
use crate::profile::MinerProfile;

/// Validate the profile against the catalog and resolve a launch spec.
///
/// `worker_name` overrides the profile's worker name when set.
///
/// # Errors
///
/// Returns the first failed check as a `StartMineError`.
pub fn resolve_spec(
    profile: &MinerProfile,
    catalog: &Catalog,
    gpus: &GpuSet,
    worker_name: Option<&str>,
) -> Result<MineSpec, StartMineError> {
    if profile.coin_id.is_nil() {
        return Err(StartMineError::NoCoinSelected);
    }
    let coin = catalog
        .coin(&profile.coin_id)
        .ok_or(StartMineError::CoinNotFound)?;
    let coin_profile = profile.coin_profile(&coin.id);
    let pool = catalog
        .pool(&coin_profile.pool_id)
        .ok_or(StartMineError::NoPoolSelected)?;
    let coin_kernel = catalog
        .coin_kernel(&coin_profile.coin_kernel_id)
        .ok_or(StartMineError::NoKernelSelected)?;
    let kernel = catalog
        .kernel(&coin_kernel.kernel_id)
        .ok_or(StartMineError::KernelNotFound)?;
    let input = kernel
        .input
        .as_ref()
        .ok_or(StartMineError::KernelInputMissing)?;
    if kernel.output.is_none() {
        return Err(StartMineError::KernelOutputMissing);
    }
    if !coin_kernel.supports(gpus.gpu_type) {
        return Err(StartMineError::GpuNotSupported(gpus.gpu_type));
    }

    let pool_profile = profile.pool_profile(&pool.id);
    if pool.is_user_mode && pool_profile.user_name.is_empty() {
        return Err(StartMineError::PoolUserNameMissing);
    }
    let wallet = if coin_profile.wallet.is_empty() {
        coin.test_wallet.clone().unwrap_or_default()
    } else {
        coin_profile.wallet.clone()
    };
    if wallet.is_empty() && !pool.is_user_mode {
        return Err(StartMineError::WalletMissing);
    }

    let main = CoinSelection {
        coin_id: coin.id,
        coin_code: coin.code.clone(),
        pool_id: pool.id,
        pool_server: pool.server.clone(),
        wallet,
        user_name: pool_profile.user_name.clone(),
    };

    let ck_profile = profile.coin_kernel_profile(&coin_kernel.id);
    let dual = if ck_profile.is_dual_coin_enabled {
        let dual_coin = catalog
            .coin(&ck_profile.dual_coin_id)
            .ok_or(StartMineError::NoDualCoinSelected)?;
        let dual_profile = profile.coin_profile(&dual_coin.id);
        let dual_pool = catalog
            .pool(&dual_profile.dual_coin_pool_id)
            .ok_or(StartMineError::NoDualPoolSelected)?;
        let dual_wallet = if dual_profile.dual_coin_wallet.is_empty() {
            dual_coin.test_wallet.clone().unwrap_or_default()
        } else {
            dual_profile.dual_coin_wallet.clone()
        };
        if dual_wallet.is_empty() {
            return Err(StartMineError::DualWalletMissing);
        }
        Some(CoinSelection {
            coin_id: dual_coin.id,
            coin_code: dual_coin.code.clone(),
            pool_id: dual_pool.id,
            pool_server: dual_pool.server.clone(),
            wallet: dual_wallet,
            user_name: profile.pool_profile(&dual_pool.id).user_name,
        })
    } else {
        None
    };

    if kernel.package.trim().is_empty() {
        return Err(StartMineError::PackageMissing);
    }
    if input.args.trim().is_empty() {
        return Err(StartMineError::ArgsMissing);
    }

    let worker_name = worker_name
        .filter(|w| !w.is_empty())
        .unwrap_or(profile.worker_name.as_str())
        .to_string();
    let gpu_indices = gpus.select(&profile.gpu_indices);
    let command_line = build_command_line(
        kernel,
        input,
        &coin_kernel.args,
        &main,
        dual.as_ref(),
        &worker_name,
        &pool_profile.password,
        &gpu_indices,
    );

    Ok(MineSpec {
        worker_name,
        main,
        dual,
        kernel: kernel.clone(),
        coin_kernel_id: coin_kernel.id,
        gpu_indices,
        command_line,
    })
}

#[allow(clippy::too_many_arguments)]
fn build_command_line(
    kernel: &Kernel,
    input: &KernelInput,
    coin_args: &str,
    main: &CoinSelection,
    dual: Option<&CoinSelection>,
    worker_name: &str,
    password: &str,
    gpu_indices: &[u32],
) -> String {
    let devices = gpu_indices
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");

    let mut args = input.args.clone();
    if !coin_args.trim().is_empty() {
        args.push(' ');
        args.push_str(coin_args.trim());
    }
    if let Some(dual) = dual {
        if !input.dual_args.trim().is_empty() {
            args.push(' ');
            args.push_str(input.dual_args.trim());
        }
        args = args
            .replace("{dual_pool}", &dual.pool_server)
            .replace("{dual_wallet}", &dual.wallet);
    }

    let line = args
        .replace("{pool}", &main.pool_server)
        .replace("{wallet}", &main.wallet)
        .replace("{user}", &main.user_name)
        .replace("{password}", password)
        .replace("{worker}", worker_name)
        .replace("{devices}", &devices);
    tracing::debug!(kernel = %kernel.full_name(), args = %line, "Built kernel command line");
    line
}


#[cfg(test)]
mod tests {
    use super::*;
    use hashfleet_core::{CoinId, GpuType};

    fn main_coin_profile(profile: &mut MinerProfile) -> &mut crate::profile::CoinProfile {
        let id = profile.coin_id;
        profile.coin_profile_mut(id)
    }

    #[test]
    fn valid_profile_resolves() {
        let (profile, catalog, gpus) = fixtures::valid();
        let spec = resolve_spec(&profile, &catalog, &gpus, None).unwrap();
        assert_eq!(spec.main.coin_code, "ETC");
        assert_eq!(spec.gpu_indices, vec![0, 1]);
        assert!(spec.dual.is_none());
        assert_eq!(
            spec.command_line,
            "--server stratum+tcp://etc.pool:4444 --user 0xabc.rig-01 --devices 0,1 --algo etchash"
        );
    }

    #[test]
    fn no_coin_selected() {
        let (mut profile, catalog, gpus) = fixtures::valid();
        profile.coin_id = CoinId::nil();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::NoCoinSelected
        );
    }

    #[test]
    fn unknown_coin() {
        let (mut profile, catalog, gpus) = fixtures::valid();
        profile.coin_id = CoinId::generate();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::CoinNotFound
        );
    }

    #[test]
    fn pool_checked_before_kernel() {
        let (mut profile, catalog, gpus) = fixtures::valid();
        let cp = main_coin_profile(&mut profile);
        cp.pool_id = hashfleet_core::PoolId::nil();
        cp.coin_kernel_id = hashfleet_core::CoinKernelId::nil();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::NoPoolSelected
        );
    }

    #[test]
    fn missing_kernel_output() {
        let (profile, mut catalog, gpus) = fixtures::valid();
        catalog.kernels[0].output = None;
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::KernelOutputMissing
        );
    }

    #[test]
    fn unsupported_gpu_type() {
        let (profile, mut catalog, gpus) = fixtures::valid();
        catalog.coin_kernels[0].supported_gpus = vec![GpuType::Amd];
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::GpuNotSupported(GpuType::Nvidia)
        );
    }

    #[test]
    fn wallet_required_unless_account_mode() {
        let (mut profile, mut catalog, gpus) = fixtures::valid();
        main_coin_profile(&mut profile).wallet.clear();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::WalletMissing
        );

        catalog.pools[0].is_user_mode = true;
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::PoolUserNameMissing
        );

        let pool_id = catalog.pools[0].id;
        profile.pools.entry(pool_id).or_default().user_name = "acct".into();
        let spec = resolve_spec(&profile, &catalog, &gpus, None).unwrap();
        assert_eq!(spec.main.user_name, "acct");
        assert!(spec.main.wallet.is_empty());
    }

    #[test]
    fn test_wallet_fills_empty_wallet() {
        let (mut profile, mut catalog, gpus) = fixtures::valid();
        main_coin_profile(&mut profile).wallet.clear();
        catalog.coins[0].test_wallet = Some("0xtest".into());
        let spec = resolve_spec(&profile, &catalog, &gpus, None).unwrap();
        assert_eq!(spec.main.wallet, "0xtest");
    }

    #[test]
    fn dual_coin_is_validated() {
        let (mut profile, catalog, gpus) = fixtures::valid();
        let ck = catalog.coin_kernels[0].id;
        profile.coin_kernels.get_mut(&ck).unwrap().is_dual_coin_enabled = true;

        let spec = resolve_spec(&profile, &catalog, &gpus, None).unwrap();
        let dual = spec.dual.as_ref().unwrap();
        assert_eq!(dual.coin_code, "TON");
        assert!(spec
            .command_line
            .contains("--dserver stratum+tcp://ton.pool:5555 --duser UQdual"));

        let dual_id = catalog.coins[1].id;
        profile.coin_profile_mut(dual_id).dual_coin_wallet.clear();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::DualWalletMissing
        );

        profile.coin_kernels.get_mut(&ck).unwrap().dual_coin_id = CoinId::nil();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::NoDualCoinSelected
        );
    }

    #[test]
    fn package_then_args() {
        let (profile, mut catalog, gpus) = fixtures::valid();
        catalog.kernels[0].package.clear();
        catalog.kernels[0].input.as_mut().unwrap().args.clear();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::PackageMissing
        );
        catalog.kernels[0].package = "k.zip".into();
        assert_eq!(
            resolve_spec(&profile, &catalog, &gpus, None).unwrap_err(),
            StartMineError::ArgsMissing
        );
    }

    #[test]
    fn worker_name_override() {
        let (profile, catalog, gpus) = fixtures::valid();
        let spec = resolve_spec(&profile, &catalog, &gpus, Some("fleet-7")).unwrap();
        assert_eq!(spec.worker_name, "fleet-7");
        let spec = resolve_spec(&profile, &catalog, &gpus, Some("")).unwrap();
        assert_eq!(spec.worker_name, "rig-01");
    }
}
