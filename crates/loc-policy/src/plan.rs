use loc_schemas::{LocationError, SourceKind, Tier, UpdateParameters};

use crate::types::{ActivationEntry, ActivationPlan, PolicyConfig};

/// Resolve `tier` into the sources to activate.
///
/// | Tier     | Sources                   | Interval                                |
/// |----------|---------------------------|-----------------------------------------|
/// | High     | Precise                   | as requested                            |
/// | Balanced | Passive, Network, Precise | Precise = max(floor, requested * mult)  |
/// | Low      | Passive, Network          | as requested                            |
/// | None     | Passive                   | as requested                            |
///
/// # Errors
/// `InvalidArgument` when `requested` is malformed.
pub fn resolve(
    tier: Tier,
    requested: &UpdateParameters,
    cfg: &PolicyConfig,
) -> Result<ActivationPlan, LocationError> {
    requested.validate()?;
    let params = *requested;

    let entries = match tier {
        Tier::HighAccuracy => vec![ActivationEntry {
            kind: SourceKind::Precise,
            params,
            accuracy_ceiling_m: cfg.high_accuracy_ceiling_m,
        }],
        Tier::BalancedPowerAccuracy => vec![
            ActivationEntry::new(SourceKind::Passive, params),
            ActivationEntry::new(SourceKind::Network, params),
            ActivationEntry {
                kind: SourceKind::Precise,
                params: relaxed_precise(&params, cfg),
                accuracy_ceiling_m: cfg.balanced_ceiling_m,
            },
        ],
        Tier::LowPower => vec![
            ActivationEntry::new(SourceKind::Passive, params),
            ActivationEntry::new(SourceKind::Network, params),
        ],
        Tier::NoPower => vec![ActivationEntry::new(SourceKind::Passive, params)],
    };

    Ok(ActivationPlan { entries })
}

/// Same as [`resolve`] but from a numeric priority code. Unknown codes fail
/// with `InvalidArgument`; nothing falls back to a default tier.
pub fn resolve_code(
    code: i32,
    requested: &UpdateParameters,
    cfg: &PolicyConfig,
) -> Result<ActivationPlan, LocationError> {
    resolve(Tier::from_code(code)?, requested, cfg)
}

fn relaxed_precise(params: &UpdateParameters, cfg: &PolicyConfig) -> UpdateParameters {
    let scaled = params
        .min_interval_ms
        .saturating_mul(cfg.balanced_interval_multiplier);
    let interval = scaled.max(cfg.precise_interval_floor_ms);
    UpdateParameters {
        min_interval_ms: interval,
        // keep fastest <= interval
        fastest_interval_ms: params.fastest_interval_ms.min(interval),
        ..*params
    }
}
