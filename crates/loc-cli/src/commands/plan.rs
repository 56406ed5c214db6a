use anyhow::Result;
use loc_runtime::RuntimeSettings;
use loc_schemas::UpdateParameters;
use serde_json::json;

use super::parse_tier;

pub fn print_plan(tier: &str, interval_ms: u64, settings: &RuntimeSettings) -> Result<()> {
    let tier = parse_tier(tier)?;
    let params = UpdateParameters::new().interval_ms(interval_ms);
    let plan = loc_policy::resolve(tier, &params, &settings.policy)?;

    let out = json!({
        "tier": tier.as_str(),
        "code": tier.code(),
        "entries": plan.entries,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
