//! Volume set reconciliation.

use crate::types::VolumeId;
use std::collections::HashSet;

/// Volumes in `recorded` that are not in `attached`.
///
/// Keeps the order of `recorded` and drops duplicates, so reattaching the
/// result is deterministic and never requests the same volume twice.
pub fn detached_from(recorded: &[VolumeId], attached: &[VolumeId]) -> Vec<VolumeId> {
    let attached: HashSet<&VolumeId> = attached.iter().collect();
    let mut seen = HashSet::new();

    recorded
        .iter()
        .filter(|id| !attached.contains(id) && seen.insert(*id))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vol(n: u8) -> VolumeId {
        format!("00000000-0000-4000-8000-0000000000{n:02x}")
            .parse()
            .unwrap()
    }

    #[test]
    fn test_detached_from_subtracts_attached() {
        let (a, b, c) = (vol(1), vol(2), vol(3));
        let result = detached_from(&[a.clone(), b.clone(), c.clone()], &[b]);
        assert_eq!(result, vec![a, c]);
    }

    #[test]
    fn test_detached_from_all_attached() {
        let (a, b) = (vol(1), vol(2));
        assert!(detached_from(&[a.clone(), b.clone()], &[b, a]).is_empty());
    }

    #[test]
    fn test_detached_from_ignores_foreign_volumes() {
        let (a, b, extra) = (vol(1), vol(2), vol(9));
        let result = detached_from(&[a.clone(), b], &[vol(2), extra]);
        assert_eq!(result, vec![a]);
    }

    #[test]
    fn test_detached_from_empty_record() {
        assert!(detached_from(&[], &[vol(1)]).is_empty());
    }

    #[test]
    fn test_detached_from_deduplicates() {
        let a = vol(1);
        let result = detached_from(&[a.clone(), a.clone()], &[]);
        assert_eq!(result, vec![a]);
    }
}
