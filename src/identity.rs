use std::collections::HashMap;

use tracing::debug;

use crate::monitor::{MonitorIdentity, OutputTechnology};
use crate::topology::{AdapterId, CurrentPath, DisplayApi, TargetKey};

/// Decode the packed EDID manufacturer id into its three-letter PNP code.
///
/// The OS reports the field byte-swapped. After swapping, bits 14-10, 9-5 and
/// 4-0 each hold a letter (1 = 'A' .. 26 = 'Z'). Anything outside that range
/// comes back as `?` followed by the raw value in hex.
pub fn decode_manufacturer_id(raw: u16) -> String {
    let packed = raw.swap_bytes();
    let fields = [(packed >> 10) & 0x1F, (packed >> 5) & 0x1F, packed & 0x1F];

    if fields.iter().any(|&f| !(1..=26).contains(&f)) {
        return format!("?{:04X}", raw);
    }

    fields.iter().map(|&f| (b'A' + (f as u8) - 1) as char).collect()
}

/// Identity of the monitor behind one target, or `None` when the OS has no name for it.
pub fn resolve_identity<A: DisplayApi + ?Sized>(
    api: &A,
    adapter_id: AdapterId,
    target_id: u32,
) -> Option<MonitorIdentity> {
    match api.target_device_name(adapter_id, target_id) {
        Ok(name) => Some(MonitorIdentity {
            manufacturer: decode_manufacturer_id(name.edid_manufacture_id),
            product_code: name.edid_product_code_id,
            friendly_name: name.friendly_name,
            device_path: name.device_path,
            connector: OutputTechnology::from_raw(name.output_technology),
        }),
        Err(status) => {
            debug!(%adapter_id, target_id, %status, "target has no resolvable name, skipping");
            None
        }
    }
}

/// Identities for every distinct target in a query, each resolved once.
#[derive(Clone, Debug, Default)]
pub struct IdentityMap {
    by_target: HashMap<TargetKey, MonitorIdentity>,
}

impl IdentityMap {
    pub fn resolve<A: DisplayApi + ?Sized>(api: &A, paths: &[CurrentPath]) -> Self {
        let mut by_target = HashMap::new();
        let mut unresolvable = Vec::new();

        for path in paths {
            let key = path.target_key();
            if by_target.contains_key(&key) || unresolvable.contains(&key) {
                continue;
            }
            match resolve_identity(api, key.0, key.1) {
                Some(identity) => {
                    by_target.insert(key, identity);
                }
                None => unresolvable.push(key),
            }
        }

        IdentityMap { by_target }
    }

    pub fn for_path(&self, path: &CurrentPath) -> Option<&MonitorIdentity> {
        self.by_target.get(&path.target_key())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    #[cfg(test)]
    pub fn insert(&mut self, key: TargetKey, identity: MonitorIdentity) {
        self.by_target.insert(key, identity);
    }
}
