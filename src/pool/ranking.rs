//! Account selection order for `acquire`.
//!
//! Affinity matches come first, ordered by configured priority. Every other
//! eligible account follows, least utilized first. Ties break on active
//! slots, then priority, then id, so the order is deterministic.

use super::account::AccountView;
use crate::task::Domain;
use std::cmp::Ordering;

/// Indices of eligible accounts in the order they should be tried.
pub(crate) fn rank(accounts: &[AccountView<'_>], domain: Domain) -> Vec<usize> {
    let mut affinity: Vec<usize> = Vec::new();
    let mut general: Vec<usize> = Vec::new();

    for (idx, account) in accounts.iter().enumerate() {
        if !account.is_eligible() {
            continue;
        }
        if account.serves(domain) {
            affinity.push(idx);
        } else {
            general.push(idx);
        }
    }

    affinity.sort_by(|&a, &b| {
        let (a, b) = (&accounts[a], &accounts[b]);
        a.config
            .priority
            .cmp(&b.config.priority)
            .then_with(|| a.config.id.cmp(&b.config.id))
    });

    general.sort_by(|&a, &b| {
        let (a, b) = (&accounts[a], &accounts[b]);
        a.utilization()
            .partial_cmp(&b.utilization())
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.active().cmp(&b.active()))
            .then_with(|| a.config.priority.cmp(&b.config.priority))
            .then_with(|| a.config.id.cmp(&b.config.id))
    });

    affinity.extend(general);
    affinity
}
