//! Grouping of flow and stock records.
//!
//! [`aggregate`] merges every record sharing a key into one record: amounts
//! are summed and compositions merged amount-weighted. Output order is the
//! first appearance of each key in the input, so anything derived from it
//! (colors, link order) is reproducible.

use std::hash::Hash;

use indexmap::IndexMap;

use crate::model::{Composition, Flow, Fraction, Id, Stock};

/// Name given to merged compositions whose members disagree.
pub const MIXED_COMPOSITION_NAME: &str = "aggregated";

/// Anything carrying an amount and a composition.
pub trait Transfer: Clone {
    fn id(&self) -> &Id;
    fn amount(&self) -> f64;
    fn composition(&self) -> Option<&Composition>;
    fn set_amount(&mut self, amount: f64);
    fn set_composition(&mut self, composition: Option<Composition>);
}

impl Transfer for Flow {
    fn id(&self) -> &Id {
        &self.id
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn composition(&self) -> Option<&Composition> {
        self.composition.as_ref()
    }

    fn set_amount(&mut self, amount: f64) {
        self.amount = amount;
    }

    fn set_composition(&mut self, composition: Option<Composition>) {
        self.composition = composition;
    }
}

impl Transfer for Stock {
    fn id(&self) -> &Id {
        &self.id
    }

    fn amount(&self) -> f64 {
        self.amount
    }

    fn composition(&self) -> Option<&Composition> {
        self.composition.as_ref()
    }

    fn set_amount(&mut self, amount: f64) {
        self.amount = amount;
    }

    fn set_composition(&mut self, composition: Option<Composition>) {
        self.composition = composition;
    }
}

#[derive(Debug, Clone)]
pub struct Aggregated<K, R> {
    pub key: K,
    /// First member with summed amount and merged composition. Endpoints are
    /// still the first member's; callers rewrite them for what the key means.
    pub record: R,
    pub members: Vec<Id>,
}

pub fn aggregate<R, K, F>(records: &[R], key_fn: F) -> Vec<Aggregated<K, R>>
where
    R: Transfer,
    K: Eq + Hash,
    F: Fn(&R) -> K,
{
    let mut groups: IndexMap<K, Vec<&R>> = IndexMap::new();
    for record in records {
        groups.entry(key_fn(record)).or_default().push(record);
    }
    groups
        .into_iter()
        .map(|(key, members)| {
            let mut record = members[0].clone();
            record.set_amount(members.iter().map(|m| m.amount()).sum());
            record.set_composition(merge_compositions(&members));
            Aggregated {
                key,
                record,
                members: members.iter().map(|m| m.id().clone()).collect(),
            }
        })
        .collect()
}

/// Amount-weighted merge of the members' compositions.
///
/// Fractions are not renormalized: members without a composition leave an
/// unknown remainder. With a zero total every member weighs the same.
pub fn merge_compositions<R: Transfer>(members: &[&R]) -> Option<Composition> {
    if members.iter().all(|m| m.composition().is_none()) {
        return None;
    }
    let total: f64 = members.iter().map(|m| m.amount()).sum();
    let count = members.len() as f64;

    struct Merged {
        fraction: f64,
        avoidable: bool,
    }
    let mut merged: IndexMap<Id, Merged> = IndexMap::new();
    for member in members {
        let Some(composition) = member.composition() else {
            continue;
        };
        let weight = if total > 0.0 {
            member.amount() / total
        } else {
            1.0 / count
        };
        for fraction in &composition.fractions {
            let entry = merged.entry(fraction.material.clone()).or_insert(Merged {
                fraction: 0.0,
                avoidable: true,
            });
            entry.fraction += fraction.fraction * weight;
            entry.avoidable &= fraction.avoidable;
        }
    }

    // A member without a composition, or with an unsaved one, breaks the shared id.
    let mut ids = members
        .iter()
        .map(|m| m.composition().and_then(|c| c.id.as_ref()));
    let first = ids.next().flatten();
    let shared = first.filter(|first| ids.all(|id| id == Some(*first)));
    let (id, name) = match shared {
        Some(id) => {
            let name = members
                .iter()
                .find_map(|m| m.composition().map(|c| c.name.clone()))
                .unwrap_or_default();
            (Some(id.clone()), name)
        }
        None => (None, MIXED_COMPOSITION_NAME.to_string()),
    };

    Some(Composition {
        id,
        name,
        fractions: merged
            .into_iter()
            .map(|(material, m)| Fraction {
                material,
                fraction: m.fraction,
                avoidable: m.avoidable,
                publication: None,
            })
            .collect(),
    })
}
