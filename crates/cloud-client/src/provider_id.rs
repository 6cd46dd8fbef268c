//! Provider id helpers
//!
//! Provider ids join cloud instances to Machines and Nodes. The format is
//! `aws:///<zone>/<instance-id>`.

const SCHEME: &str = "aws://";

/// Builds the provider id for an instance in a zone.
pub fn provider_id(zone: &str, instance_id: &str) -> String {
    format!("{}/{}/{}", SCHEME, zone, instance_id)
}

/// Splits a provider id into `(zone, instance_id)`.
///
/// Returns `None` if the scheme is wrong or either part is empty.
pub fn parse_provider_id(provider_id: &str) -> Option<(&str, &str)> {
    let rest = provider_id.strip_prefix(SCHEME)?.strip_prefix('/')?;
    let (zone, instance_id) = rest.rsplit_once('/')?;
    let zone = zone.trim_start_matches('/');
    if zone.is_empty() || instance_id.is_empty() {
        return None;
    }
    Some((zone, instance_id))
}
